pub mod datatype;
pub mod row_batch;
pub mod scalar;
pub mod tuple_data_pool;

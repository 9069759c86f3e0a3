pub mod ml;
pub mod parser;
pub mod progressive;
pub mod scaler;
pub mod table_builder;
pub mod trainer;
pub mod windower;

pub mod generate;
pub mod trends;
pub mod upload;

pub use generate::GenerateArgs;
pub use trends::TrendsArgs;
pub use upload::UploadArgs;

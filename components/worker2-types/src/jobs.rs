mod function_job;

pub use self::function_job::FunctionJob;

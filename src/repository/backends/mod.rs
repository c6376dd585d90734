pub mod entity;
pub mod file;
pub mod memory;
pub mod sea_orm;

pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use sea_orm::SeaOrmRepository;

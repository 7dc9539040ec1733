pub mod disk;

pub use disk::DiskAvatarStore;

pub mod local;
pub mod remote;

pub use local::ProfileLocalClient;
pub use remote::RemoteProfileClient;

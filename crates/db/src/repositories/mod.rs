mod upload_repo;

pub use upload_repo::UploadRepo;

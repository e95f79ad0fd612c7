pub mod access;
pub mod catalog;
pub mod domain;
pub mod identity;
pub mod navigation;
pub mod ports;
pub mod progress;
pub mod youtube;

pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use domain::{
    AuthUser, Course, CourseTree, Role, Section, SectionWithVideos, UserCredentials, UserProfile,
    UserProgress, Video, VideoContext, Visibility,
};
pub use identity::{Viewer, ViewerResolver};
pub use ports::{
    ContentStore, IdentityProvider, PortError, PortResult, ProfileStore, ProgressStore,
};

pub mod client;
pub mod error;
pub mod model;

pub use error::ListingError;
pub use model::{
    AssignedStudent, Lesson, LessonStatus, ListResult, PurchaseMethod, StudentOccurrence,
    StudentSubscription,
};

pub mod bulk;
pub mod course;
pub mod request;
pub mod student;

pub use bulk::{AllocationSummary, BulkResult, CourseAllocation, ItemResult, ItemStatus};
pub use course::{Course, CourseSlot, NewCourse, NewCourseSlot};
pub use request::{CourseRequest, NewCourseRequest, RequestFilter, RequestKind};
pub use student::{Batch, BatchChange, NewBatch, NewStudent, Student};

mod plane;
pub use self::plane::*;

mod polygon;
pub use self::polygon::*;

mod bounding_box;
pub use self::bounding_box::*;

mod pose;
pub use self::pose::*;

pub mod screw_record;

pub use screw_record::ScrewRecord;

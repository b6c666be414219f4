pub mod catalog;
pub mod launch;
pub mod registry;

pub use catalog::{CATALOG, ORDER_STEP, Platform, SlicerDescriptor, descriptor, list_descriptors};
pub use launch::{LaunchHandle, LaunchPlan, bundle_root, launch, plan_launch, spawn_plan};
pub use registry::SlicerRegistry;

pub mod vms;

pub mod analytics;
pub mod availability;
pub mod booking_records;
pub mod lifecycle;
pub mod payment;
pub mod pricing;
pub mod receipt;
pub mod window;

#[cfg(test)]
pub(crate) mod test_support;

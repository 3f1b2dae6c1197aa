pub mod sync_report;

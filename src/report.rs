//! Append-only CSV report writers
//!
//! Reports record model-level data about a run: admissions, state
//! transitions, daily census, and the end-of-run summary. Each report type
//! gets its own CSV file under the configured output directory. Writers are
//! append-only; the simulation never reads its own output back.
//!
//! A record sent for a report type that was never registered is silently
//! dropped, so library tests can drive the model without creating files.

use csv::Writer;
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use crate::context::Context;
use crate::error::SimError;
use crate::log::trace;

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>);
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! create_report_trait {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(&self, writer: &mut csv::Writer<std::fs::File>) {
                writer.serialize(self).unwrap();
            }
        }
    };
}
pub use create_report_trait;

struct ReportData {
    directory: PathBuf,
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
}

// Registers a data container that stores
// * directory: Where report files are created
// * file_writers: Maps report type to file writer
crate::context::define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        directory: PathBuf::from("."),
        file_writers: RefCell::new(HashMap::new()),
    }
);

pub trait ContextReportExt {
    /// Set the directory report files are created in
    fn set_report_directory(&mut self, directory: PathBuf);

    /// Register a report type, creating `<directory>/<name>.csv`
    ///
    /// # Errors
    ///
    /// Returns an `SimError` if the file or its parent directories cannot
    /// be created.
    fn add_report<T: Report>(&mut self, name: &str) -> Result<(), SimError>;

    /// Write a new row with columns following items in the report struct
    /// to the report file associated with the report type struct. Dropped
    /// if the type was never registered.
    fn send_report<T: Report>(&self, report: T);
}

impl ContextReportExt for Context {
    fn set_report_directory(&mut self, directory: PathBuf) {
        self.get_data_container_mut(ReportPlugin).directory = directory;
    }

    fn add_report<T: Report>(&mut self, name: &str) -> Result<(), SimError> {
        let data_container = self.get_data_container_mut(ReportPlugin);
        create_dir_all(&data_container.directory)?;
        let path = data_container.directory.join(format!("{name}.csv"));
        let file = File::create(path)?;
        let writer = Writer::from_writer(file);
        let mut file_writers = data_container.file_writers.borrow_mut();
        file_writers.insert(TypeId::of::<T>(), writer);
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) {
        // No data container will exist if no reports have been added
        let Some(data_container) = self.get_data_container(ReportPlugin) else {
            trace!("dropping report record: no reports registered");
            return;
        };
        let mut file_writers = data_container.file_writers.try_borrow_mut().unwrap();
        let Some(writer) = file_writers.get_mut(&report.type_id()) else {
            trace!("dropping report record: type not registered");
            return;
        };
        report.serialize(writer);
        writer.flush().expect("Failed to flush writer");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize)]
    struct SampleReport {
        id: u32,
        value: String,
    }

    create_report_trait!(SampleReport);

    #[test]
    fn add_and_send_report() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context.set_report_directory(temp_dir.path().to_path_buf());
        context.add_report::<SampleReport>("sample_report").unwrap();

        context.send_report(SampleReport {
            id: 1,
            value: "Test Value".to_string(),
        });

        let file_path = temp_dir.path().join("sample_report.csv");
        assert!(file_path.exists(), "CSV file should exist");

        let mut reader = csv::Reader::from_path(file_path).unwrap();
        for result in reader.deserialize() {
            let record: SampleReport = result.unwrap();
            assert_eq!(record.id, 1);
            assert_eq!(record.value, "Test Value");
        }
    }

    #[test]
    fn directory_creation_works() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context.set_report_directory(temp_dir.path().join("nested").join("output"));
        context.add_report::<SampleReport>("sample_report").unwrap();

        context.send_report(SampleReport {
            id: 1,
            value: "Test Value".to_string(),
        });

        let file_path = temp_dir
            .path()
            .join("nested")
            .join("output")
            .join("sample_report.csv");
        assert!(file_path.exists(), "CSV file should exist");
    }

    #[test]
    fn send_report_without_adding_report_is_dropped() {
        let context = Context::new();
        // Must not panic; library tests run the model with no reports.
        context.send_report(SampleReport {
            id: 1,
            value: "Test Value".to_string(),
        });
    }

    #[test]
    fn multiple_records_one_file() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context.set_report_directory(temp_dir.path().to_path_buf());
        context.add_report::<SampleReport>("sample_report").unwrap();

        context.send_report(SampleReport {
            id: 1,
            value: "Value,1".to_string(),
        });
        context.send_report(SampleReport {
            id: 2,
            value: "Value\n2".to_string(),
        });

        let file_path = temp_dir.path().join("sample_report.csv");
        let mut reader = csv::Reader::from_path(file_path).expect("Failed to open CSV file");
        let mut records = reader.deserialize::<SampleReport>();

        let item1: SampleReport = records
            .next()
            .expect("No record found")
            .expect("Failed to deserialize record");
        assert_eq!(item1.id, 1);
        assert_eq!(item1.value, "Value,1");

        let item2: SampleReport = records
            .next()
            .expect("No second record found")
            .expect("Failed to deserialize record");
        assert_eq!(item2.id, 2);
        assert_eq!(item2.value, "Value\n2");
    }
}

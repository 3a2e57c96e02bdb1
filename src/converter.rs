//! End-to-end conversion of a course backup into a PreTeXt project.

use std::path::Path;
use std::time::Instant;

use crate::archive::{open_backup, ArchiveReader};
use crate::assets::AssetManager;
use crate::course::Course;
use crate::error::Result;
use crate::format::MarkupFormatter;
use crate::options::BuildOptions;
use crate::output::{copy_scaffold, DirectorySink, OutputSink};
use crate::report::BuildReport;
use crate::runner::{CodeRunner, PythonCodeRunner};
use crate::writer::PtxWriter;

pub struct Converter {
    options: BuildOptions,
    formatter: Option<Box<dyn MarkupFormatter>>,
}

impl Converter {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            formatter: None,
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn MarkupFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Convert the backup at `backup` (directory or `.mbz`) into `output_dir`,
    /// running reference solutions with the configured interpreter.
    pub fn convert_path(self, backup: &Path, output_dir: &Path) -> Result<BuildReport> {
        let mut archive = open_backup(backup)?;
        let mut sink = DirectorySink::create(output_dir, self.options.overwrite)?;
        let runner = PythonCodeRunner::new(&self.options.interpreter, self.options.timeout);
        self.convert(
            archive.as_mut(),
            &runner,
            &mut sink,
            &backup.display().to_string(),
            &output_dir.display().to_string(),
        )
    }

    pub fn convert(
        self,
        archive: &mut dyn ArchiveReader,
        runner: &dyn CodeRunner,
        sink: &mut dyn OutputSink,
        input_name: &str,
        output_name: &str,
    ) -> Result<BuildReport> {
        let started = Instant::now();
        let mut report = BuildReport::new(input_name, output_name, self.options.on_reference_error);

        let mut course = Course::load(archive)?;
        log::info!(
            "Loaded {} assignments with {} questions",
            course.assignments.len(),
            course.question_count()
        );

        let mut assets = AssetManager::from_archive(archive)?;
        let attached = course.attach_datafiles(&mut assets)?;
        log::debug!("attached data files to {} questions", attached);

        let mut writer = PtxWriter::new(&mut assets, runner, self.options);
        if let Some(formatter) = self.formatter {
            writer = writer.with_formatter(formatter);
        }
        writer.process(&course.assignments, sink)?;
        let (statistics, warnings) = writer.into_report_parts();

        let materialized = assets.take_materialized();
        for (path, bytes) in &materialized {
            sink.write_file(path, bytes)?;
        }
        let scaffold_files = copy_scaffold(sink)?;
        log::debug!(
            "wrote {} assets and {} project files",
            materialized.len(),
            scaffold_files
        );

        report.statistics = statistics;
        for warning in warnings {
            report.add_warning(warning);
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Converted {} questions in {}ms ({} warnings)",
            report.statistics.questions,
            report.duration_ms,
            report.statistics.warning_count
        );
        Ok(report)
    }
}

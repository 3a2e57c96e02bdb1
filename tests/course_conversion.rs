use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use moodle2pretext::archive::{ArchiveReader, DirectoryArchive};
use moodle2pretext::course::Course;
use moodle2pretext::output::MemorySink;
use moodle2pretext::report::BuildReport;
use moodle2pretext::runner::{CodeRunner, RunError};
use moodle2pretext::{BuildOptions, ConvertError, Converter};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/course")
}

/// Answers every reference run with `cat` and remembers the data files it saw.
#[derive(Default)]
struct FirstPetRunner {
    files: RefCell<Vec<BTreeMap<String, String>>>,
}

impl CodeRunner for FirstPetRunner {
    fn run(&self, _code: &str, _stdin: &str, files: &BTreeMap<String, String>) -> Result<String, RunError> {
        self.files.borrow_mut().push(files.clone());
        Ok("cat".to_string())
    }
}

fn convert_fixture(runner: &FirstPetRunner) -> (MemorySink, BuildReport) {
    let mut archive = DirectoryArchive::open(&fixture()).unwrap();
    let mut sink = MemorySink::new();
    let report = Converter::new(BuildOptions::default())
        .convert(&mut archive, runner, &mut sink, "course", "book")
        .unwrap();
    (sink, report)
}

#[test]
fn assignments_follow_section_order() {
    let mut archive = DirectoryArchive::open(&fixture()).unwrap();
    let course = Course::load(&mut archive).unwrap();

    let names: Vec<&str> = course.assignments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Getting Started", "Week 1"]);
    let numbers: Vec<i64> = course.sections.iter().map(|s| s.number).collect();
    assert_eq!(numbers, [0, 1]);
    assert_eq!(course.sections[1].summary, "<p>First week</p>");
    assert_eq!(course.question_count(), 3);

    let week_one = &course.assignments[1];
    assert_eq!(week_one.intro, "<p>Files and <alert>loops</alert></p>");
    let ids: Vec<&str> = week_one.questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, ["420", "301"]);
}

#[test]
fn main_document_includes_sections_in_order() {
    let (sink, _) = convert_fixture(&FirstPetRunner::default());
    let main = sink.text("source/main.ptx").unwrap();

    assert!(main.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<pretext xml:lang=\"en-US\""));
    assert!(main.contains("<title>Exercises</title>"));
    let first = main.find("<xi:include href=\"./sec-0-Getting-Started.ptx\"/>").unwrap();
    let second = main.find("<xi:include href=\"./sec-1-Week-1.ptx\"/>").unwrap();
    assert!(first < second);
}

#[test]
fn sections_hold_their_exercises() {
    let (sink, _) = convert_fixture(&FirstPetRunner::default());

    let started = sink.text("source/sec-0-Getting-Started.ptx").unwrap();
    assert!(started.contains("<section xml:id=\"sec-Getting-Started-1\">"));
    assert!(started.contains("<choices randomize=\"yes\" multiple-correct=\"no\">"));
    assert!(started.contains("<feedback>\n"));
    assert!(started.contains("<p>Count again.</p>"));

    let week = sink.text("source/sec-1-Week-1.ptx").unwrap();
    assert!(week.contains("<p>Files and <alert>loops</alert></p>"));
    let reading = week.find("label=\"exe-sec-Week-1-1-420\"").unwrap();
    let first_pet = week.find("label=\"exe-sec-Week-1-1-301\"").unwrap();
    assert!(reading < first_pet);
    assert!(week.contains("<title>First Pet</title>"));
    assert!(week.contains("<p>Return the first line of <c>pets.txt</c>.</p>"));
}

#[test]
fn code_runner_gets_datafiles_examples_and_images() {
    let runner = FirstPetRunner::default();
    let (sink, report) = convert_fixture(&runner);
    let week = sink.text("source/sec-1-Week-1.ptx").unwrap();

    let seen = runner.files.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get("pets.txt").map(String::as_str), Some("cat\nparrot\n"));

    assert!(week.contains("<cell><pre>print(first_pet())</pre></cell>\n"));
    assert!(week.contains("<cell><pre>cat</pre></cell>\n"));
    assert!(week.contains(r#""pets.txt": "cat\nparrot\n","#));
    assert!(week.contains("<image source=\"images/301-graph%20plot.png\" width=\"90%\" decorative=\"yes\"/>"));
    assert_eq!(
        sink.files.get("assets/images/301-graph plot.png").map(Vec::as_slice),
        Some(&b"PNG-DATA"[..])
    );

    assert_eq!(report.statistics.assets_copied, 1);
    assert_eq!(report.statistics.examples_run, 1);
}

#[test]
fn report_counts_the_build() {
    let (sink, report) = convert_fixture(&FirstPetRunner::default());

    assert_eq!(report.input, "course");
    assert_eq!(report.output, "book");
    assert_eq!(report.statistics.assignments, 2);
    assert_eq!(report.statistics.questions, 3);
    assert_eq!(report.statistics.variant_counts.get("code-runner"), Some(&1));
    assert_eq!(report.statistics.variant_counts.get("multiple-choice"), Some(&1));
    assert_eq!(report.statistics.variant_counts.get("description"), Some(&1));
    assert!(report.warnings.is_empty());

    assert!(sink.text("project.ptx").is_some());
    assert!(sink.text("publication/publication.ptx").is_some());
}

#[test]
fn unreferenced_entries_are_never_built() {
    // Entry 43 is an essay, which would fail if it were built.
    let mut archive = DirectoryArchive::open(&fixture()).unwrap();
    assert!(Course::load(&mut archive).is_ok());
}

#[test]
fn missing_entries_are_reported() {
    let mut archive = moodle2pretext::archive::MemoryArchive::new()
        .with_member(
            "activities/quiz_1/quiz.xml",
            r#"<activity id="1" moduleid="1"><quiz id="1"><name>q</name><intro></intro>
               <questionbankentryid>99</questionbankentryid></quiz></activity>"#,
        )
        .with_member("questions.xml", "<question_categories/>");
    let err = Course::load(&mut archive).unwrap_err();
    assert!(matches!(err, ConvertError::MissingQuestionBankEntry(ref id) if id == "99"));
}

/// Pack the fixture directory into an `.mbz` the way Moodle ships it.
fn zip_fixture(target: &Path) {
    let mut source = DirectoryArchive::open(&fixture()).unwrap();
    let file = fs::File::create(target).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for name in source.member_names() {
        let bytes = source.read_member(&name).unwrap();
        zip.start_file(name, zip::write::FileOptions::default()).unwrap();
        zip.write_all(&bytes).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn converts_a_zipped_backup_to_disk() {
    let dir = TempDir::new().unwrap();
    let backup = dir.path().join("course.mbz");
    zip_fixture(&backup);
    let output = dir.path().join("book");

    let options = BuildOptions::default().with_examples(false);
    let report = Converter::new(options).convert_path(&backup, &output).unwrap();

    assert_eq!(report.statistics.questions, 3);
    assert_eq!(report.statistics.examples_run, 0);
    assert!(output.join("source").join("main.ptx").is_file());
    assert!(output.join("source").join("sec-1-Week-1.ptx").is_file());
    assert_eq!(
        fs::read(output.join("assets").join("images").join("301-graph plot.png")).unwrap(),
        b"PNG-DATA"
    );
    assert!(output.join("project.ptx").is_file());
}

/// Pack the fixture directory into a gzipped tarball, Moodle's default format.
fn tar_gz_fixture(target: &Path) {
    let mut source = DirectoryArchive::open(&fixture()).unwrap();
    let gz = flate2::write::GzEncoder::new(fs::File::create(target).unwrap(), flate2::Compression::default());
    let mut tarball = tar::Builder::new(gz);
    for name in source.member_names() {
        let bytes = source.read_member(&name).unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        tarball
            .append_data(&mut header, format!("./{name}"), bytes.as_slice())
            .unwrap();
    }
    tarball.into_inner().unwrap().finish().unwrap();
}

#[test]
fn converts_a_gzipped_tarball_backup() {
    let dir = TempDir::new().unwrap();
    let backup = dir.path().join("course.mbz");
    tar_gz_fixture(&backup);
    let output = dir.path().join("book");

    let options = BuildOptions::default().with_examples(false);
    let report = Converter::new(options).convert_path(&backup, &output).unwrap();

    assert_eq!(report.statistics.assignments, 2);
    assert_eq!(report.statistics.questions, 3);
    assert!(output.join("source").join("sec-0-Getting-Started.ptx").is_file());
    assert_eq!(
        fs::read(output.join("assets").join("images").join("301-graph plot.png")).unwrap(),
        b"PNG-DATA"
    );
}

#[test]
fn non_empty_output_needs_overwrite() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("book");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("notes.txt"), "keep").unwrap();

    let options = BuildOptions::default().with_examples(false);
    let err = Converter::new(options.clone())
        .convert_path(&fixture(), &output)
        .unwrap_err();
    assert!(matches!(err, ConvertError::Io(_)));

    Converter::new(options.with_overwrite(true))
        .convert_path(&fixture(), &output)
        .unwrap();
    assert!(output.join("notes.txt").is_file());
    assert!(output.join("source").join("main.ptx").is_file());
}

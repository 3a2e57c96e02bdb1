//! PreTeXt generation.
//!
//! [`PtxWriter`] turns assignments into one `section` file each plus a
//! `main.ptx` that includes them. Questions dispatch on their variant;
//! images pointing at stored files are copied out through the
//! [`AssetResolver`], and code-runner statements get worked examples from
//! running the reference solution.

pub mod code;
pub mod examples;
pub mod ids;

use crate::assets::AssetResolver;
use crate::assignment::Assignment;
use crate::error::{ConvertError, Result};
use crate::format::{MarkupFormatter, PretextFormatter, XML_DECLARATION};
use crate::html::{pretextify, Dom, NodeId, ITEM_ID_ATTR};
use crate::options::BuildOptions;
use crate::output::OutputSink;
use crate::question::{
    CodeRunnerQuestion, Condition, ExerciseGroupQuestion, FillInQuestion, MatchingQuestion,
    MultipleChoiceQuestion, Question, QuestionKind,
};
use crate::report::{BuildStatistics, BuildWarning, WarningKind};
use crate::runner::{run_example_cases, CodeRunner};

pub use code::{CodeWriter, ProgramParts};
pub use ids::{make_id_like, IdRegistry};

pub const XINCLUDE_NAMESPACE: &str = "http://www.w3.org/2001/XInclude";
pub const SOURCE_DIR: &str = "source";
pub const MAIN_FILE: &str = "main.ptx";
/// Name of the single blank in a fill-in exercise.
pub const FILLIN_NAME: &str = "answer";

const PLUGINFILE_PREFIX: &str = "@@PLUGINFILE@@/";

pub struct PtxWriter<'a> {
    ids: IdRegistry,
    code_writer: CodeWriter,
    assets: &'a mut dyn AssetResolver,
    runner: &'a dyn CodeRunner,
    options: BuildOptions,
    formatter: Box<dyn MarkupFormatter>,
    statistics: BuildStatistics,
    warnings: Vec<BuildWarning>,
}

impl<'a> PtxWriter<'a> {
    pub fn new(
        assets: &'a mut dyn AssetResolver,
        runner: &'a dyn CodeRunner,
        options: BuildOptions,
    ) -> Self {
        Self {
            ids: IdRegistry::new(),
            code_writer: CodeWriter::new(),
            assets,
            runner,
            options,
            formatter: Box::new(PretextFormatter::default()),
            statistics: BuildStatistics::default(),
            warnings: Vec::new(),
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn MarkupFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn statistics(&self) -> &BuildStatistics {
        &self.statistics
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn into_report_parts(self) -> (BuildStatistics, Vec<BuildWarning>) {
        (self.statistics, self.warnings)
    }

    /// Write every assignment file and the main document.
    pub fn process(&mut self, assignments: &[Assignment], sink: &mut dyn OutputSink) -> Result<()> {
        let filenames = self.generate_assignment_files(assignments, sink)?;
        let mut dom = Dom::new();
        let main = self.make_main_document(&mut dom, &filenames);
        sink.write_file(
            &format!("{SOURCE_DIR}/{MAIN_FILE}"),
            self.render(&dom, main).as_bytes(),
        )?;
        Ok(())
    }

    pub fn generate_assignment_files(
        &mut self,
        assignments: &[Assignment],
        sink: &mut dyn OutputSink,
    ) -> Result<Vec<String>> {
        let mut filenames = Vec::with_capacity(assignments.len());
        for (index, assignment) in assignments.iter().enumerate() {
            let filename = format!("sec-{}-{}.ptx", index, make_id_like(&assignment.name)?);
            self.create_assignment_file(assignment, &filename, sink)?;
            filenames.push(filename);
        }
        Ok(filenames)
    }

    pub fn create_assignment_file(
        &mut self,
        assignment: &Assignment,
        filename: &str,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        let mut dom = Dom::new();
        let section = self.make_assignment(&mut dom, assignment)?;
        sink.write_file(
            &format!("{SOURCE_DIR}/{filename}"),
            self.render(&dom, section).as_bytes(),
        )?;
        log::info!("Wrote {} ({})", filename, assignment.name);
        Ok(())
    }

    pub fn make_main_document(&self, dom: &mut Dom, filenames: &[String]) -> NodeId {
        let pretext = dom.create_element_with_attrs(
            "pretext",
            &[("xml:lang", "en-US"), ("xmlns:xi", XINCLUDE_NAMESPACE)],
        );
        let book = dom.create_element("book");
        let book_title = text_element(dom, "title", &self.options.book_title);
        dom.append(book, book_title);

        let chapter = dom.create_element("chapter");
        let chapter_title = text_element(dom, "title", &self.options.chapter_title);
        dom.append(chapter, chapter_title);
        for filename in filenames {
            let include = dom.create_element_with_attrs("xi:include", &[("href", format!("./{filename}").as_str())]);
            dom.append(chapter, include);
        }
        dom.append(book, chapter);
        dom.append(pretext, book);
        pretext
    }

    pub fn make_assignment(&mut self, dom: &mut Dom, assignment: &Assignment) -> Result<NodeId> {
        let section_id = self.ids.make_unique_id("sec", &assignment.name)?;
        let section = dom.create_element_with_attrs("section", &[("xml:id", section_id.as_str())]);
        let title = text_element(dom, "title", &assignment.name);
        dom.append(section, title);
        let introduction = markup_element(dom, "introduction", &assignment.intro);
        dom.append(section, introduction);

        let exercises = dom.create_element("exercises");
        for question in &assignment.questions {
            let exercise = self.process_question(dom, question, &section_id)?;
            dom.append(exercises, exercise);
        }
        dom.append(section, exercises);
        self.statistics.assignments += 1;
        Ok(section)
    }

    /// Build the markup for one question, with asset links resolved.
    pub fn process_question(&mut self, dom: &mut Dom, question: &Question, section_id: &str) -> Result<NodeId> {
        let node = self.build_question(dom, question, section_id)?;
        self.fix_asset_links(dom, node, &question.id)?;
        self.statistics.questions += 1;
        Ok(node)
    }

    fn build_question(&mut self, dom: &mut Dom, question: &Question, section_id: &str) -> Result<NodeId> {
        self.statistics.increment_variant(question.kind.label());
        match &question.kind {
            QuestionKind::ExerciseGroup(group) => self.make_exercise_group(dom, question, group, section_id),
            _ => self.make_exercise(dom, question, section_id),
        }
    }

    fn make_exercise(&mut self, dom: &mut Dom, question: &Question, section_id: &str) -> Result<NodeId> {
        let exercise_id = self.ids.make_unique_id("exer", &question.name)?;
        let label = format!("exe-{}-{}", section_id, question.id);
        let exercise = dom.create_element_with_attrs("exercise", &[("xml:id", exercise_id.as_str()), ("label", label.as_str())]);
        let title = text_element(dom, "title", question.title_or_placeholder());
        dom.append(exercise, title);
        let statement = markup_element(dom, "statement", &question.question_text);
        dom.append(exercise, statement);

        match &question.kind {
            QuestionKind::Matching(matching) => {
                let matches = matching_parts(dom, matching)?;
                dom.append(exercise, matches);
            }
            QuestionKind::MultipleChoice(multiple_choice) => {
                let choices = multiple_choice_parts(dom, multiple_choice)?;
                dom.append(exercise, choices);
            }
            QuestionKind::FillIn(fill_in) => fill_in_parts(dom, exercise, statement, fill_in)?,
            QuestionKind::CodeRunner(code) => {
                self.append_worked_examples(dom, statement, question, code)?;
                let program = self.program(dom, code);
                dom.append(exercise, program);
            }
            QuestionKind::Description | QuestionKind::ExerciseGroup(_) => {}
        }
        Ok(exercise)
    }

    fn make_exercise_group(
        &mut self,
        dom: &mut Dom,
        question: &Question,
        group: &ExerciseGroupQuestion,
        section_id: &str,
    ) -> Result<NodeId> {
        let group_id = self.ids.make_unique_id("group", &question.name)?;
        let node = dom.create_element_with_attrs("exercisegroup", &[("xml:id", group_id.as_str())]);
        let title = text_element(dom, "title", question.title_or_placeholder());
        dom.append(node, title);
        let introduction = markup_element(dom, "introduction", &question.question_text);
        dom.append(node, introduction);
        for exercise in &group.exercises {
            let child = self.build_question(dom, exercise, section_id)?;
            dom.append(node, child);
        }
        Ok(node)
    }

    fn append_worked_examples(
        &mut self,
        dom: &mut Dom,
        statement: NodeId,
        question: &Question,
        code: &CodeRunnerQuestion,
    ) -> Result<()> {
        if !self.options.run_examples || code.example_cases().next().is_none() {
            return Ok(());
        }
        if !code.is_python() {
            log::warn!(
                "question {}: no worked examples for {} exercises",
                question.id,
                code.language
            );
            self.warnings.push(BuildWarning::new(
                WarningKind::UnsupportedLanguage,
                &question.id,
                format!("no worked examples for {} exercises", code.language),
            ));
            return Ok(());
        }

        let results = run_example_cases(self.runner, code, &question.id, self.options.on_reference_error)?;
        self.statistics.examples_run += results.runs.len();
        self.statistics.example_failures += results.failures.len();
        for failure in &results.failures {
            self.warnings.push(BuildWarning::new(
                WarningKind::ReferenceSolutionFailed,
                &question.id,
                failure.to_string(),
            ));
        }
        examples::append_worked_example(dom, statement, &results.runs);
        Ok(())
    }

    fn program(&self, dom: &mut Dom, code: &CodeRunnerQuestion) -> NodeId {
        let parts = self.code_writer.program_parts(code);
        let program = dom.create_element_with_attrs(
            "program",
            &[("language", parts.language.as_str()), ("interactive", "activecode")],
        );
        if let Some(preamble) = &parts.preamble {
            let node = hidden_text_element(dom, "preamble", preamble);
            dom.append(program, node);
        }
        let body = text_element(dom, "code", &parts.code);
        dom.append(program, body);
        if let Some(postamble) = &parts.postamble {
            let node = hidden_text_element(dom, "postamble", postamble);
            dom.append(program, node);
        }
        if let Some(tests) = &parts.tests {
            let node = hidden_text_element(dom, "tests", tests);
            dom.append(program, node);
        }
        program
    }

    /// Point images at materialized copies of stored files.
    fn fix_asset_links(&mut self, dom: &mut Dom, node: NodeId, question_id: &str) -> Result<()> {
        for image in dom.find_all(node, &["image"]) {
            let owner = dom
                .remove_attr(image, ITEM_ID_ATTR)
                .unwrap_or_else(|| question_id.to_string());
            let Some(source) = dom.attr(image, "source").map(str::to_string) else {
                continue;
            };
            let Some(encoded) = plugin_file_path(&source) else {
                continue;
            };
            let path = urlencoding::decode(encoded)
                .map_err(|_| ConvertError::InvalidAssetPath(encoded.to_string()))?;
            let located = self.assets.locate_resource(&owner, &path)?;
            self.statistics.assets_copied += 1;
            dom.set_attr(image, "source", &encode_path(&located));
        }
        Ok(())
    }

    fn render(&self, dom: &Dom, node: NodeId) -> String {
        format!("{}\n{}", XML_DECLARATION, self.formatter.format(&dom.outer_html(node)))
    }
}

fn matching_parts(dom: &mut Dom, matching: &MatchingQuestion) -> Result<NodeId> {
    let matches = dom.create_element("matches");
    for pair in &matching.matches {
        let node = dom.create_element("match");
        let premise = markup_element(dom, "premise", &pair.premise);
        let response = markup_element(dom, "response", &pair.response);
        dom.append(node, premise);
        dom.append(node, response);
        dom.append(matches, node);
    }
    Ok(matches)
}

fn multiple_choice_parts(dom: &mut Dom, question: &MultipleChoiceQuestion) -> Result<NodeId> {
    let choices = dom.create_element_with_attrs(
        "choices",
        &[
            ("randomize", "yes"),
            ("multiple-correct", yes_or_no(question.allows_multiple_answers)),
        ],
    );
    for choice in &question.choices {
        let node = dom.create_element_with_attrs("choice", &[("correct", yes_or_no(choice.is_correct))]);
        let statement = markup_element(dom, "statement", &choice.statement);
        dom.append(node, statement);
        if !choice.feedback.trim().is_empty() {
            let feedback = markup_element(dom, "feedback", &choice.feedback);
            dom.append(node, feedback);
        }
        dom.append(choices, node);
    }
    Ok(choices)
}

fn fill_in_parts(dom: &mut Dom, exercise: NodeId, statement: NodeId, question: &FillInQuestion) -> Result<()> {
    let mode = if question.is_numeric() { "number" } else { "string" };
    let blank_line = dom.create_element("p");
    let blank = dom.create_element_with_attrs("fillin", &[("mode", mode), ("name", FILLIN_NAME)]);
    dom.append(blank_line, blank);
    dom.append(statement, blank_line);

    let evaluation = dom.create_element("evaluation");
    let evaluate = dom.create_element_with_attrs("evaluate", &[("name", FILLIN_NAME)]);
    for (index, answer) in question.answers.iter().enumerate() {
        let test = if index == 0 {
            dom.create_element_with_attrs("test", &[("correct", "yes")])
        } else {
            dom.create_element("test")
        };
        let comparison = match &answer.condition {
            Condition::Text(text) if text.contains('*') => {
                text_element(dom, "strmatch", &wildcard_pattern(text))
            }
            Condition::Text(text) => text_element(dom, "strcmp", text),
            Condition::Numeric { value, tolerance } => dom.create_element_with_attrs(
                "numcmp",
                &[
                    ("value", value.to_string().as_str()),
                    ("tolerance", tolerance.to_string().as_str()),
                ],
            ),
        };
        dom.append(test, comparison);
        if !answer.feedback.trim().is_empty() {
            let owner = Some(answer.id.as_str()).filter(|id| !id.is_empty());
            let feedback = markup_element(dom, "feedback", &pretextify(&answer.feedback, owner)?);
            dom.append(test, feedback);
        }
        dom.append(evaluate, test);
    }
    dom.append(evaluation, evaluate);
    dom.append(exercise, evaluation);
    Ok(())
}

/// Anchored regex for a Moodle short answer where `*` matches anything.
pub fn wildcard_pattern(text: &str) -> String {
    let parts: Vec<String> = text.split('*').map(regex::escape).collect();
    format!("^{}$", parts.join(".*"))
}

/// The stored-file path of a `@@PLUGINFILE@@/` link, still percent-encoded.
fn plugin_file_path(source: &str) -> Option<&str> {
    let rest = source.strip_prefix(PLUGINFILE_PREFIX)?;
    let end = rest.find(['?', '\n']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Percent-encode each segment of a `/`-separated path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn yes_or_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn text_element(dom: &mut Dom, name: &str, text: &str) -> NodeId {
    let element = dom.create_element(name);
    if !text.is_empty() {
        let content = dom.create_text(text);
        dom.append(element, content);
    }
    element
}

fn hidden_text_element(dom: &mut Dom, name: &str, text: &str) -> NodeId {
    let element = text_element(dom, name, text);
    dom.set_attr(element, "visible", "no");
    element
}

/// An element whose content is the given markup fragment.
fn markup_element(dom: &mut Dom, name: &str, markup: &str) -> NodeId {
    let element = dom.create_element(name);
    dom.parse_into(element, markup);
    element
}

//! Loading a whole course from a backup.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use roxmltree::Document;

use crate::archive::ArchiveReader;
use crate::assets::AssetResolver;
use crate::assignment::{Assignment, AssignmentRecord};
use crate::bank::{QuestionBank, QUESTIONS_MEMBER};
use crate::error::{ConvertError, Result};
use crate::section::Section;

const QUIZ_MEMBERS: &str = r"^activities/quiz_[0-9]+/quiz\.xml$";
const SECTION_MEMBERS: &str = r"^sections/section_[0-9]+/section\.xml$";

#[derive(Debug, Clone, Default)]
pub struct Course {
    pub assignments: Vec<Assignment>,
    pub sections: Vec<Section>,
}

impl Course {
    pub fn load(archive: &mut dyn ArchiveReader) -> Result<Self> {
        let quiz_members = archive.members_matching(&Regex::new(QUIZ_MEMBERS)?);
        let mut records = Vec::with_capacity(quiz_members.len());
        for member in &quiz_members {
            records.push(parse_member(archive, member, AssignmentRecord::from_document)?);
        }

        let wanted: HashSet<String> = records
            .iter()
            .flat_map(|record| record.question_refs.iter().cloned())
            .collect();
        let bank = QuestionBank::from_xml(&archive.read_text(QUESTIONS_MEMBER)?, &wanted)?;

        let mut assignments = Vec::with_capacity(records.len());
        for record in &records {
            let assignment = Assignment::from_record(record, &bank)?;
            log::info!(
                "Loaded assignment {} ({} questions)",
                assignment.name,
                assignment.questions.len()
            );
            assignments.push(assignment);
        }

        let mut sections = Vec::new();
        for member in archive.members_matching(&Regex::new(SECTION_MEMBERS)?) {
            let section = parse_member(archive, &member, Section::from_document)?;
            log::info!("Loaded section {} ({})", section.number, section.name);
            sections.push(section);
        }
        sections.sort_by_key(|section| section.number);

        let mut course = Self {
            assignments,
            sections,
        };
        course.sort_assignments_by_section();
        Ok(course)
    }

    /// Order assignments the way the sections list them; assignments that no
    /// section mentions keep their relative order at the end.
    pub fn sort_assignments_by_section(&mut self) {
        let position: HashMap<String, usize> = self
            .assignments
            .iter()
            .enumerate()
            .map(|(index, assignment)| (assignment.id.clone(), index))
            .collect();

        let mut placed = vec![false; self.assignments.len()];
        let mut order = Vec::with_capacity(self.assignments.len());
        for section in &self.sections {
            for content in &section.contents {
                match position.get(content) {
                    Some(&index) if !placed[index] => {
                        placed[index] = true;
                        order.push(index);
                    }
                    Some(_) => {}
                    None => log::debug!(
                        "section {} lists module {} which is not a quiz",
                        section.number,
                        content
                    ),
                }
            }
        }
        order.extend((0..self.assignments.len()).filter(|&index| !placed[index]));

        let mut slots: Vec<Option<Assignment>> =
            std::mem::take(&mut self.assignments).into_iter().map(Some).collect();
        self.assignments = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
    }

    /// Hand every code-runner question the data files stored with it.
    pub fn attach_datafiles(&mut self, assets: &mut dyn AssetResolver) -> Result<usize> {
        let mut attached = 0;
        for assignment in &mut self.assignments {
            for question in &mut assignment.questions {
                if question.as_code_runner().is_none() {
                    continue;
                }
                let files = assets.asset_contents(&question.id)?;
                if question.attach_datafiles(files) {
                    attached += 1;
                }
            }
        }
        Ok(attached)
    }

    pub fn question_count(&self) -> usize {
        self.assignments
            .iter()
            .map(|assignment| assignment.questions.len())
            .sum()
    }
}

fn parse_member<T>(
    archive: &mut dyn ArchiveReader,
    member: &str,
    build: impl FnOnce(&Document) -> Result<T>,
) -> Result<T> {
    let xml = archive.read_text(member)?;
    let document = Document::parse(&xml).map_err(|source| ConvertError::Xml {
        member: member.to_string(),
        source,
    })?;
    build(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(id: &str) -> Assignment {
        Assignment::new(id, &format!("quiz {id}"), "", Vec::new()).unwrap()
    }

    fn section(number: i64, contents: &[&str]) -> Section {
        Section {
            number,
            name: String::new(),
            summary: String::new(),
            contents: contents.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn sections_decide_the_order() {
        let mut course = Course {
            assignments: vec![assignment("1"), assignment("2"), assignment("3")],
            sections: vec![section(0, &["7", "3"]), section(1, &["1", "99"])],
        };
        course.sort_assignments_by_section();
        let ids: Vec<&str> = course.assignments.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn repeated_references_do_not_duplicate() {
        let mut course = Course {
            assignments: vec![assignment("1"), assignment("2")],
            sections: vec![section(0, &["2", "2"]), section(1, &["2"])],
        };
        course.sort_assignments_by_section();
        let ids: Vec<&str> = course.assignments.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }
}

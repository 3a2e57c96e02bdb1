//! Worked-example tables for code-runner statements.

use crate::html::{Dom, NodeId};
use crate::runner::ExampleRun;

pub const LEAD_IN: &str = "For example:";

/// Which columns a worked example shows, decided by its first run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleColumns {
    pub test: bool,
    pub input: bool,
}

impl ExampleColumns {
    pub fn for_run(run: &ExampleRun) -> Self {
        Self {
            test: !run.test_code.is_empty(),
            input: !run.input.is_empty(),
        }
    }

    pub fn widths(&self) -> &'static [&'static str] {
        match (self.test, self.input) {
            (true, true) => &["40%", "20%", "40%"],
            (true, false) | (false, true) => &["50%", "50%"],
            (false, false) => &["100%"],
        }
    }

    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::new();
        if self.test {
            headers.push("Test");
        }
        if self.input {
            headers.push("Input");
        }
        headers.push("Result");
        headers
    }

    fn cells<'r>(&self, run: &'r ExampleRun) -> Vec<&'r str> {
        let mut cells = Vec::new();
        if self.test {
            cells.push(run.test_code.as_str());
        }
        if self.input {
            cells.push(run.input.as_str());
        }
        cells.push(run.output.as_str());
        cells
    }
}

/// Append the lead-in paragraph and the example table to `parent`.
pub fn append_worked_example(dom: &mut Dom, parent: NodeId, runs: &[ExampleRun]) {
    let Some(first) = runs.first() else {
        return;
    };
    let columns = ExampleColumns::for_run(first);

    let lead_in = text_element(dom, "p", LEAD_IN);
    dom.append(parent, lead_in);

    let tabular = dom.create_element_with_attrs("tabular", &[("top", "major"), ("bottom", "major")]);
    for &width in columns.widths() {
        let col = dom.create_element_with_attrs("col", &[("width", width), ("right", "minor")]);
        dom.append(tabular, col);
    }

    let header = dom.create_element_with_attrs("row", &[("header", "yes"), ("bottom", "minor")]);
    for title in columns.headers() {
        let cell = text_element(dom, "cell", title);
        dom.append(header, cell);
    }
    dom.append(tabular, header);

    for run in runs {
        let row = dom.create_element_with_attrs("row", &[("bottom", "minor")]);
        for value in columns.cells(run) {
            let cell = dom.create_element("cell");
            let pre = text_element(dom, "pre", value);
            dom.append(cell, pre);
            dom.append(row, cell);
        }
        dom.append(tabular, row);
    }
    dom.append(parent, tabular);
}

fn text_element(dom: &mut Dom, name: &str, text: &str) -> NodeId {
    let element = dom.create_element(name);
    if !text.is_empty() {
        let content = dom.create_text(text);
        dom.append(element, content);
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(test_code: &str, input: &str, output: &str) -> ExampleRun {
        ExampleRun {
            test_code: test_code.to_string(),
            input: input.to_string(),
            output: output.to_string(),
        }
    }

    #[test]
    fn column_profiles() {
        assert_eq!(ExampleColumns::for_run(&run("t", "i", "o")).widths(), &["40%", "20%", "40%"]);
        assert_eq!(ExampleColumns::for_run(&run("t", "", "o")).widths(), &["50%", "50%"]);
        assert_eq!(ExampleColumns::for_run(&run("", "i", "o")).headers(), vec!["Input", "Result"]);
        assert_eq!(ExampleColumns::for_run(&run("", "", "o")).widths(), &["100%"]);
    }

    #[test]
    fn table_has_header_and_one_row_per_run() {
        let mut dom = Dom::new();
        let statement = dom.create_element("statement");
        dom.append(Dom::ROOT, statement);
        append_worked_example(
            &mut dom,
            statement,
            &[run("print(add(2))", "", "4"), run("print(add(3))", "", "5")],
        );

        assert_eq!(
            dom.to_string(),
            "<statement><p>For example:</p>\
             <tabular top=\"major\" bottom=\"major\">\
             <col width=\"50%\" right=\"minor\"/><col width=\"50%\" right=\"minor\"/>\
             <row header=\"yes\" bottom=\"minor\"><cell>Test</cell><cell>Result</cell></row>\
             <row bottom=\"minor\"><cell><pre>print(add(2))</pre></cell><cell><pre>4</pre></cell></row>\
             <row bottom=\"minor\"><cell><pre>print(add(3))</pre></cell><cell><pre>5</pre></cell></row>\
             </tabular></statement>"
        );
    }

    #[test]
    fn nothing_is_added_without_runs() {
        let mut dom = Dom::new();
        append_worked_example(&mut dom, Dom::ROOT, &[]);
        assert_eq!(dom.to_string(), "");
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use quasilang::ast::{Group, Node};
use quasilang::grouper::Grouper;
use quasilang::printer::Printer;
use quasilang::reader::Reader;

fn parse_with_limit(source: &str, limit: usize) -> Group {
    let src = Rc::new(RefCell::new(Reader::from_string(source)));
    Grouper::with_limit(src, limit)
        .and_then(|mut grouper| grouper.parse())
        .unwrap_or_else(|e| panic!("{:?} failed to parse: {}", source, e))
}

fn compact(source: &str) -> String {
    Printer::compact().print(&Node::Group(parse_with_limit(source, 64)))
}

#[test]
fn compact_dump_of_simple_body() {
    let expected = "\
Group(file) <2/2 nodes>
`-Group(halt) <2/2 nodes>
  `-Group(body) <2/2 nodes>
    |-Group(command) <1/1 nodes>
    | `-Token(keyword) <0:1>(\"a\")
    `-Group(halt) <1/1 nodes>
      `-Token(keyword) <0:3>(\"b\")
";
    assert_eq!(compact("{a;b}"), expected);
}

#[test]
fn expression_lines_carry_priorities() {
    let dump = compact("a+b*c;");

    assert!(dump.contains("Binary(+, prio=11)"), "dump:\n{}", dump);
    assert!(dump.contains("Binary(*, prio=12)"), "dump:\n{}", dump);

    let dump = compact("+a");
    assert!(dump.contains("Unary(+, prefix, prio=13)"), "dump:\n{}", dump);

    let dump = compact("a--");
    assert!(dump.contains("Unary(--, postfix, prio=14)"), "dump:\n{}", dump);
}

#[test]
fn control_flow_labels() {
    let dump = compact("if(a){b}else{c}");
    assert!(dump.contains("Condition(if)"), "dump:\n{}", dump);
    assert!(dump.contains("Control(else)"), "dump:\n{}", dump);

    let dump = compact("while(a){b}");
    assert!(dump.contains("Loop(while)"), "dump:\n{}", dump);

    // Jumps share the control line shape.
    let dump = compact("return a");
    assert!(dump.contains("Control(return)"), "dump:\n{}", dump);

    let dump = compact("main(a){b}");
    assert!(dump.contains("FunctionDecl"), "dump:\n{}", dump);

    let dump = compact("main(a)");
    assert!(dump.contains("CallExpr"), "dump:\n{}", dump);
}

#[test]
fn compact_dump_shows_placeholders() {
    let tree = parse_with_limit("{[a,b,c,d],[e,f,g,h],[i,j,k,l]}", 4);
    let dump = Printer::compact().print(&Node::Group(tree));

    assert!(
        dump.contains("Placeholder(item) [4 nested nodes]"),
        "dump:\n{}",
        dump
    );
}

#[test]
fn full_dump_expands_placeholders() {
    let source = "{[a,b,c,d],[e,f,g,h],[i,j,k,l]}";

    let squeezed = parse_with_limit(source, 4);
    let full = Printer::full().print(&Node::Group(squeezed));

    assert!(!full.contains("Placeholder"), "dump:\n{}", full);
    assert!(full.contains("Group(list)"), "dump:\n{}", full);

    // The expanded dump matches the dump of an unsqueezed parse.
    let wide = parse_with_limit(source, 100);
    let reference = Printer::full().print(&Node::Group(wide));
    assert_eq!(full, reference);
}

#[test]
fn full_dump_is_repeatable() {
    let tree = parse_with_limit("{[a,b,c,d],[e,f,g,h],[i,j,k,l]}", 4);
    let root = Node::Group(tree);

    let first = Printer::full().print(&root);
    let second = Printer::full().print(&root);
    assert_eq!(first, second, "expansion must restore the reader position");
}

#[test]
fn full_dump_drops_size_annotations() {
    let dump = Printer::full().print(&Node::Group(parse_with_limit("{a;b}", 64)));

    assert!(!dump.contains("nodes>"), "dump:\n{}", dump);
    assert!(dump.contains("Group(body)"), "dump:\n{}", dump);
}

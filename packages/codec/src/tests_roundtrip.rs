use crate::config::CodecConfig;
use crate::reader::FastAtRead;
use crate::{deserialize, serialize, DiagnosticKind};
use atfile_outline::{Gnx, Outline, OutlineModel, Position};

fn write_text(outline: &Outline, root: &Position) -> String {
    let outcome = serialize(outline, root, true, &CodecConfig::default());
    assert!(
        outcome.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        outcome.diagnostics
    );
    outcome.text
}

/// Write `root`, then read the text into a fresh outline under a root with the same gnx
fn read_back(outline: &Outline, root: &Position) -> (Outline, Position, String) {
    let text = write_text(outline, root);
    let mut fresh = Outline::new();
    let fresh_root = fresh.add_top_level(root.gnx().as_str(), "", "").unwrap();
    let report = FastAtRead::new(&mut fresh)
        .read_into_root(&text, "test.py", fresh_root.gnx())
        .unwrap_or_else(|e| panic!("{}\n--- text ---\n{}", e, text));
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    (fresh, fresh_root, text)
}

fn assert_same_tree(a: &Outline, pa: &Position, b: &Outline, pb: &Position) {
    assert_eq!(pa.gnx(), pb.gnx());
    assert_eq!(a.get_headline(pa.gnx()), b.get_headline(pb.gnx()));
    assert_eq!(
        a.get_body(pa.gnx()),
        b.get_body(pb.gnx()),
        "body of {}",
        pa.gnx()
    );
    let ca = pa.children(a);
    let cb = pb.children(b);
    assert_eq!(ca.len(), cb.len(), "children of {}", pa.gnx());
    for (x, y) in ca.iter().zip(cb.iter()) {
        assert_same_tree(a, x, b, y);
    }
}

fn assert_round_trip(outline: &Outline, root: &Position) -> String {
    let (fresh, fresh_root, text) = read_back(outline, root);
    assert_same_tree(outline, root, &fresh, &fresh_root);
    text
}

#[test]
fn test_nested_others_round_trip() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "@file shapes.py", "import math\n\n@others\n")
        .unwrap();
    let class = outline
        .add_new_child(root.gnx(), "k1", "class Circle", "class Circle:\n    @others\n")
        .unwrap();
    outline
        .add_new_child(&class, "m1", "area", "def area(self):\n    return math.pi\n")
        .unwrap();
    outline
        .add_new_child(&class, "m2", "blank lines", "\n\ndef grow(self):\n\n    pass\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "f1", "main", "def main():\n    pass\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("    #@+node:m1: *3* area\n    def area(self):\n"));
    // Blank lines carry no indentation
    assert!(!text.contains("    \n"));
}

#[test]
fn test_write_read_write_is_stable() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "@file a.py", "@others\n")
        .unwrap();
    let a = outline
        .add_new_child(root.gnx(), "a", "A", "def a():\n    @others\n")
        .unwrap();
    let b = outline.add_new_child(&a, "b", "B", "def b():\n    @others\n").unwrap();
    outline.add_new_child(&b, "c", "C", "pass\n").unwrap();

    let (fresh, fresh_root, text) = read_back(&outline, &root);
    assert!(text.contains("#@+node:c: *4* C"));
    assert_eq!(write_text(&fresh, &fresh_root), text);
}

#[test]
fn test_tab_indented_others() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "@file a.py", "@tabwidth 4\nclass A:\n\t@others\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "m", "f", "def f():\n\tpass\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("\t#@+others\n\t#@+node:m: ** f\n\tdef f():\n\t\tpass\n"));
}

#[test]
fn test_clones_keep_one_vnode() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    let a = outline.add_new_child(root.gnx(), "a", "A", "@others\n").unwrap();
    let b = outline.add_new_child(root.gnx(), "b", "B", "@others\n").unwrap();
    let shared = outline.add_new_child(&a, "s", "Shared", "shared()\n").unwrap();
    outline.add_child(&b, &shared).unwrap();

    let (fresh, fresh_root, _) = read_back(&outline, &root);
    assert_same_tree(&outline, &root, &fresh, &fresh_root);
    let parents = fresh.parents(&shared);
    assert_eq!(parents, &[Gnx::from("a"), Gnx::from("b")]);
}

#[test]
fn test_section_references() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "@file a.py", "<< imports >>\n@others\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "i", "<< imports >>", "import os\nimport sys\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "f", "f", "def f():\n    << body >> # tail\n")
        .unwrap();
    let f = Gnx::from("f");
    outline
        .add_new_child(&f, "fb", "<< body >>", "return 1\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("    #@+<< body >>\n    #@+node:fb: *3* << body >>\n    return 1\n"));
    assert!(text.contains("#@afterref\n # tail\n"));
}

#[test]
fn test_first_and_last_lines() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level(
            "r1",
            "@file a.py",
            "@first #!/usr/bin/env python\n@first\nimport os\n@last # end\n",
        )
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.starts_with("#!/usr/bin/env python\n\n#@+leo-ver=5-thin\n"));
    assert!(text.ends_with("#@-leo\n# end\n"));
}

#[test]
fn test_sentinel_lookalikes_are_escaped() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    outline
        .add_new_child(root.gnx(), "c", "C", "#@+node:fake: * F\n    #@-others\nx = 1\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert_eq!(text.matches("#@verbatim").count(), 2);
}

#[test]
fn test_raw_region() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    outline
        .add_new_child(
            root.gnx(),
            "c",
            "C",
            "@raw\n<< not a ref >>\n@others\n@end_raw\nafter\n",
        )
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("#@@raw\n<< not a ref >>\n@others\n#@@end_raw\n"));
}

#[test]
fn test_doc_parts_with_line_comments() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level(
            "r1",
            "@file a.py",
            "@ Module notes.\nSecond line.\n\n@c\nx = 1\n@doc\nmore\n",
        )
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("#@+at Module notes.\n# Second line.\n#\n#@@c\n"));
}

#[test]
fn test_doc_parts_with_block_comments() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level(
            "r1",
            "@file a.css",
            "@ Styles for the page.\nKeep short.\n@c\nbody { margin: 0; }\n",
        )
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.starts_with("/*@+leo-ver=5-thin*/\n"));
    assert!(text.contains("/*@+at Styles for the page.*/\n/*\nKeep short.\n*/\n/*@@c*/\n"));
}

#[test]
fn test_comment_directive_switches_mid_file() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "@file a.py", "@others\n").unwrap();
    outline
        .add_new_child(root.gnx(), "c1", "C1", "@comment /* */\nint x;\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "c2", "C2", "int y;\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("#@comment /* */\nint x;\n/*@+node:c2: ** C2*/\n"));
    assert!(text.ends_with("/*@-others*/\n/*@-leo*/\n"));
}

#[test]
fn test_delims_directive_switches_mid_file() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "@file a.py", "@others\n").unwrap();
    outline
        .add_new_child(root.gnx(), "c1", "C1", "@delims //\nlet x = 1;\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("#@delims // \nlet x = 1;\n//@-others\n"));
}

#[test]
fn test_at_all_with_sibling_clones() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "@file all.txt", "@all\n").unwrap();
    let a = outline
        .add_new_child(root.gnx(), "a", "@others inside", "@others\n<< x >>\n")
        .unwrap();
    outline.add_child(root.gnx(), &a).unwrap();
    outline.add_new_child(root.gnx(), "b", "B", "b\n").unwrap();
    outline.add_new_child(&a, "a1", "A1", "a1\n").unwrap();

    let text = assert_round_trip(&outline, &root);
    assert_eq!(text.matches("@+node:a:").count(), 1);
    assert!(text.contains("#@clone 2\n"));
}

#[test]
fn test_cweb_sentinels_double_at_signs() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "@file a.w", "@language cweb\n@others\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "c", "C", "x = a@b;\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.starts_with("@q@@+leo-ver=5-thin@>\n"));
    assert!(text.contains("@q@@@@language cweb@>\n"));
}

#[test]
fn test_missing_leo_is_rejected() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "x\n").unwrap();
    let text = write_text(&outline, &root).replace("#@-leo\n", "");

    let mut fresh = Outline::new();
    let fresh_root = fresh.add_top_level("r1", "", "").unwrap();
    assert!(!deserialize(&mut fresh, &text, "x.py", fresh_root.gnx()));
}

#[test]
fn test_wrong_version_is_rejected() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "x\n").unwrap();
    let text = write_text(&outline, &root).replace("ver=5", "ver=4");

    let mut fresh = Outline::new();
    let fresh_root = fresh.add_top_level("r1", "", "").unwrap();
    assert!(!deserialize(&mut fresh, &text, "x.py", fresh_root.gnx()));
}

#[test]
fn test_reread_replaces_previous_children() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    outline.add_new_child(root.gnx(), "c1", "C1", "one\n").unwrap();
    let text = write_text(&outline, &root);

    let mut target = Outline::new();
    let target_root = target.add_top_level("r1", "old", "old body\n").unwrap();
    target
        .add_new_child(target_root.gnx(), "stale", "Stale", "gone\n")
        .unwrap();
    assert!(deserialize(&mut target, &text, "x.py", target_root.gnx()));
    assert_same_tree(&outline, &root, &target, &target_root);
    assert!(target.parents(&Gnx::from("stale")).is_empty());
}

#[test]
fn test_section_defined_below_a_grandchild() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "R", "<< s >>\n@others\n")
        .unwrap();
    let x = outline.add_new_child(root.gnx(), "x", "X", "").unwrap();
    outline.add_new_child(&x, "s", "<< s >>", "defined deep\n").unwrap();

    let outcome = serialize(&outline, &root, true, &CodecConfig::default());
    assert!(!outcome.has_errors());
    assert_eq!(
        outcome.diagnostics_of(DiagnosticKind::IndirectSection).count(),
        1
    );
    assert!(outcome.text.contains("#@+node:s: *3* << s >>\n"));

    let mut fresh = Outline::new();
    let fresh_root = fresh.add_top_level("r1", "", "").unwrap();
    let report = FastAtRead::new(&mut fresh)
        .read_into_root(&outcome.text, "test.py", fresh_root.gnx())
        .unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(fresh.get_body(fresh_root.gnx()), "<< s >>\n@others\n");
    assert_eq!(fresh.get_body(&Gnx::from("s")), "defined deep\n");
    assert_eq!(fresh.children(fresh_root.gnx()), &[Gnx::from("s"), Gnx::from("x")]);
}

#[test]
fn test_cweb_raw_region() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level(
            "r1",
            "@file a.w",
            "@language cweb\n@raw\nliteral\n@end_raw\nafter\n",
        )
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("@q@@@@raw@>\nliteral\n@q@@@@end_raw@>\nafter\n"));
}

#[test]
fn test_repeated_section_reference_links_once() {
    let mut outline = Outline::new();
    let root = outline
        .add_top_level("r1", "R", "<< s >>\n<< s >>\n")
        .unwrap();
    outline
        .add_new_child(root.gnx(), "s", "<< s >>", "shared\n")
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert_eq!(text.matches("#@+node:s: ** << s >>").count(), 2);
}

#[test]
fn test_deep_levels_keep_their_parents() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    let mut parent = root.gnx().clone();
    for i in 1..=6 {
        let gnx = format!("n{}", i);
        parent = outline
            .add_new_child(&parent, &gnx, &format!("N{}", i), &format!("line {}\n", i))
            .unwrap();
    }

    let (fresh, fresh_root, text) = read_back(&outline, &root);
    assert_same_tree(&outline, &root, &fresh, &fresh_root);
    assert!(text.contains("#@+node:n1: ** N1\n"));
    assert!(text.contains("#@+node:n4: *5* N4\n"));
    assert!(text.contains("#@+node:n6: *7* N6\n"));

    let mut expected_parent = fresh_root.gnx().clone();
    for i in 1..=6 {
        let gnx = Gnx::from(format!("n{}", i).as_str());
        assert_eq!(fresh.parents(&gnx), &[expected_parent.clone()]);
        expected_parent = gnx;
    }
}

#[test]
fn test_missing_final_newline_is_added() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    outline.add_new_child(root.gnx(), "c", "C", "last").unwrap();

    let text = write_text(&outline, &root);
    assert!(text.contains("#@+node:c: ** C\nlast\n#@-others\n"));

    let mut fresh = Outline::new();
    let fresh_root = fresh.add_top_level("r1", "", "").unwrap();
    assert!(deserialize(&mut fresh, &text, "test.py", fresh_root.gnx()));
    assert_eq!(fresh.get_body(&Gnx::from("c")), "last\n");
}

#[test]
fn test_code_directive_with_trailing_text_ends_doc_part() {
    let mut outline = Outline::new();
    let root = outline.add_top_level("r1", "R", "@others\n").unwrap();
    outline
        .add_new_child(
            root.gnx(),
            "c",
            "C",
            "@ notes\nmore notes\n@c back to code\n    indented = 1\n",
        )
        .unwrap();

    let text = assert_round_trip(&outline, &root);
    assert!(text.contains("#@@c back to code\n    indented = 1\n"));
}

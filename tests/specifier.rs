use js_module_syntax::{update_specifiers, Dialect, SpecifierContext, SpecifierKind};

#[test]
fn rewrites_string_literals_preserving_quotes() {
    let src = "import a from \"./a.js\";\nimport b from './b.js';\n";
    let out = update_specifiers(src, Dialect::Js, |spec| {
        spec.value
            .strip_suffix(".js")
            .map(|stem| format!("{stem}.mjs"))
    })
    .unwrap();

    assert_eq!(out, "import a from \"./a.mjs\";\nimport b from './b.mjs';\n");
}

#[test]
fn returning_none_leaves_everything_untouched() {
    let src = "import a from './a.js';\nrequire('./b.js');\nimport('./c.js');\n";
    let out = update_specifiers(src, Dialect::Js, |_| None).unwrap();

    assert_eq!(out, src);
}

#[test]
fn enumerates_every_context() {
    let src = r#"import a from './import.js';
export { b } from './reexport.js';
export * from './exportall.js';
import('./dynamic.js');
require('./require.js');
require.resolve('./resolve.js');
import.meta.resolve('./meta.js');
"#;
    let mut seen = Vec::new();
    update_specifiers(src, Dialect::Js, |spec| {
        seen.push((spec.context, spec.value.clone()));
        None
    })
    .unwrap();

    assert_eq!(
        seen,
        vec![
            (SpecifierContext::Import, "./import.js".to_string()),
            (SpecifierContext::ReExport, "./reexport.js".to_string()),
            (SpecifierContext::ExportAll, "./exportall.js".to_string()),
            (SpecifierContext::DynamicImport, "./dynamic.js".to_string()),
            (SpecifierContext::Require, "./require.js".to_string()),
            (SpecifierContext::RequireResolve, "./resolve.js".to_string()),
            (
                SpecifierContext::ImportMetaResolve,
                "./meta.js".to_string()
            ),
        ]
    );
}

#[test]
fn template_literals_are_one_opaque_unit() {
    let src = "import(`./x/${name}.js`);\n";
    let mut kinds = Vec::new();
    let out = update_specifiers(src, Dialect::Js, |spec| {
        kinds.push(spec.kind);
        assert_eq!(spec.value, "./x/${name}.js");
        Some("./fixed.mjs".to_string())
    })
    .unwrap();

    assert_eq!(kinds, vec![SpecifierKind::TemplateLiteral]);
    assert_eq!(out, "import(`./fixed.mjs`);\n");
}

#[test]
fn concatenations_replace_the_whole_expression() {
    let src = "require('./a' + ext);\n";
    let out = update_specifiers(src, Dialect::Js, |spec| {
        assert_eq!(spec.kind, SpecifierKind::Concatenation);
        assert_eq!(spec.value, "'./a' + ext");
        Some("'./a.cjs'".to_string())
    })
    .unwrap();

    assert_eq!(out, "require('./a.cjs');\n");
}

#[test]
fn string_objects_replace_the_whole_expression() {
    let src = "import(new String('./x.js'));\n";
    let out = update_specifiers(src, Dialect::Js, |spec| {
        assert_eq!(spec.kind, SpecifierKind::StringObject);
        Some("'./x.mjs'".to_string())
    })
    .unwrap();

    assert_eq!(out, "import('./x.mjs');\n");
}

#[test]
fn finds_ts_import_type_positions() {
    let src = "type X = import('./types.js').Foo;\nconst x: X = 1 as X;\n";
    let mut seen = Vec::new();
    let out = update_specifiers(src, Dialect::Ts, |spec| {
        seen.push(spec.context);
        Some("./types.mjs".to_string())
    })
    .unwrap();

    assert_eq!(seen, vec![SpecifierContext::TsImportType]);
    assert!(out.contains("import('./types.mjs').Foo"));
}

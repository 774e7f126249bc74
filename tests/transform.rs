use js_module_syntax::{
    transform, CjsDefault, Dialect, ImportMetaMain, LiveBindings, SpecifierRewrite, Target,
    TopLevelAwait, TransformError, TransformOptions, UnsupportedConstruct,
};

fn to_cjs() -> TransformOptions {
    TransformOptions {
        target: Target::CommonJs,
        transform_syntax: true,
        ..Default::default()
    }
}

fn to_esm() -> TransformOptions {
    TransformOptions {
        target: Target::Module,
        transform_syntax: true,
        ..Default::default()
    }
}

#[test]
fn rewrites_esm_globals_to_cjs_globals() {
    let src = r#"
import.meta
import.meta.url
import.meta.dirname
import.meta.filename
import.meta.resolve('./file.cjs')
"#;
    let out = transform(src, Dialect::Js, &TransformOptions::default()).unwrap();

    assert!(!out.contains("import.meta"));
    assert!(out.contains("require(\"node:url\").pathToFileURL(__filename).toString()"));
    assert!(out.contains("__dirname"));
    assert!(out.contains("__filename"));
    assert!(out.contains("require.resolve('./file.cjs')"));
    assert!(out.contains("require.main"));
}

#[test]
fn rewrites_cjs_globals_to_esm_globals() {
    let src = r#"
__filename
__dirname
require.main
require.cache
require.resolve('./file.mjs')
module
module.exports
exports
exports.commonjs = true
"#;
    let options = TransformOptions {
        target: Target::Module,
        ..Default::default()
    };
    let out = transform(src, Dialect::Js, &options).unwrap();

    assert!(!out.contains("__filename"));
    assert!(!out.contains("__dirname"));
    assert!(!out.contains("require.resolve"));
    assert!(!out.contains("require.cache"));
    assert!(out.contains("import.meta.filename"));
    assert!(out.contains("import.meta.dirname"));
    assert!(out.contains("import.meta.resolve('./file.mjs')"));
    // Member bases and write targets stay untouched in globals-only mode.
    assert!(out.contains("exports.commonjs = true"));
}

#[test]
fn comments_out_import_meta_assignments() {
    let src = "import.meta.filename = 'foo'\n";
    let out = transform(src, Dialect::Js, &TransformOptions::default()).unwrap();

    assert!(out.contains("/* __filename = 'foo' */"));
}

#[test]
fn globals_only_never_touches_module_structure() {
    let cjs = "const a = require('./x.js');\nexports.a = a;\n";
    let out = transform(
        cjs,
        Dialect::Js,
        &TransformOptions {
            target: Target::CommonJs,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, cjs);

    let esm = "import a from './x.js';\nexport default a;\n";
    let out = transform(
        esm,
        Dialect::Js,
        &TransformOptions {
            target: Target::Module,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, esm);
}

#[test]
fn lowers_import_forms_to_require() {
    let src = r#"import './side.js';
import def from './def.js';
import * as ns from './ns.js';
import { a, b as c } from './named.js';
"#;
    let out = transform(src, Dialect::Js, &to_cjs()).unwrap();

    assert!(out.contains("require('./side.js');"));
    assert!(out.contains("function __interopDefault(mod)"));
    assert!(out.contains("const __mod0 = require('./def.js');"));
    assert!(out.contains("const def = __interopDefault(__mod0);"));
    assert!(out.contains("const __mod1 = require('./ns.js');"));
    assert!(out.contains("const ns = __mod1;"));
    assert!(out.contains("const __mod2 = require('./named.js');"));
    assert!(out.contains("const { a, b: c } = __mod2;"));
    assert!(!out.contains("import "));
}

#[test]
fn default_import_interop_policies() {
    let src = "import def from './def.js';\ndef();\n";

    let raw = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            cjs_default: CjsDefault::ModuleExports,
            ..to_cjs()
        },
    )
    .unwrap();
    assert!(raw.contains("const def = __mod0;"));
    assert!(!raw.contains("__interopDefault"));

    let prop = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            cjs_default: CjsDefault::None,
            ..to_cjs()
        },
    )
    .unwrap();
    assert!(prop.contains("const def = __mod0.default;"));
}

#[test]
fn lowers_export_declarations_with_live_binding_policies() {
    let src = "export const answer = 42;\nexport let counter = 0;\n";

    let loose = transform(src, Dialect::Js, &to_cjs()).unwrap();
    assert!(loose.contains("exports.answer = answer;"));
    assert!(loose.contains(
        "Object.defineProperty(exports, \"counter\", { enumerable: true, get: () => counter });"
    ));
    assert!(!loose.contains("export "));

    let strict = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            live_bindings: LiveBindings::Strict,
            ..to_cjs()
        },
    )
    .unwrap();
    assert!(strict.contains(
        "Object.defineProperty(exports, \"answer\", { enumerable: true, get: () => answer });"
    ));

    let off = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            live_bindings: LiveBindings::Off,
            ..to_cjs()
        },
    )
    .unwrap();
    assert!(off.contains("exports.counter = counter;"));
}

#[test]
fn lowers_reexports_with_source() {
    let src = "export { a, default as d } from './m.js';\n";
    let out = transform(src, Dialect::Js, &to_cjs()).unwrap();

    assert!(out.contains("const __mod0 = require('./m.js');"));
    assert!(out.contains("exports.a = __mod0.a;"));
    assert!(out.contains("exports.d = __interopDefault(__mod0);"));
}

#[test]
fn lowers_export_star_to_property_copy_loop() {
    let src = "export * from './all.js';\n";
    let out = transform(src, Dialect::Js, &to_cjs()).unwrap();

    assert!(out.contains("const __mod0 = require('./all.js');"));
    assert!(out.contains("for (const __key of Object.keys(__mod0))"));
    assert!(out.contains("__key === \"default\""));
    assert!(out.contains("Object.prototype.hasOwnProperty.call(exports, __key)"));
}

#[test]
fn lowers_default_exports() {
    let named = "export default function main() {\n  return 1;\n}\nmain();\n";
    let out = transform(named, Dialect::Js, &to_cjs()).unwrap();
    assert!(out.contains("function main()"));
    assert!(out.contains("module.exports = main;"));
    assert!(!out.contains("export default"));

    let anon = "export default function () {\n  return 1;\n}\n";
    let out = transform(anon, Dialect::Js, &to_cjs()).unwrap();
    assert!(out.contains("module.exports = function ()"));
}

#[test]
fn rejects_top_level_await_by_default() {
    let src = "const value = await Promise.resolve(1);\nexport default value;\n";
    let err = transform(src, Dialect::Js, &to_cjs()).unwrap_err();

    assert!(matches!(
        err,
        TransformError::Unsupported {
            kind: UnsupportedConstruct::TopLevelAwait,
            ..
        }
    ));
}

#[test]
fn wraps_top_level_await_and_repatches_exports() {
    let src = "const first = await Promise.resolve(2);\nexport const value = first;\nexport default first;\n";
    let out = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            top_level_await: TopLevelAwait::Wrap,
            ..to_cjs()
        },
    )
    .unwrap();

    assert!(out.contains("const __tla = (async () => {"));
    assert!(out.contains("exports.value = value;"));
    // A whole-object default would clobber already-attached exports.
    assert!(out.contains("exports.default = first;"));
    assert!(out.contains("return { \"value\": value };"));
    assert!(out.contains("module.exports.__tla = __tla.then((__vals) => {"));
    assert!(out.contains("Object.assign(module.exports, __vals);"));
}

#[test]
fn preserves_top_level_await_as_fire_and_forget() {
    let src = "await ready();\nexport const done = true;\n";
    let out = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            top_level_await: TopLevelAwait::Preserve,
            ..to_cjs()
        },
    )
    .unwrap();

    assert!(out.starts_with("(async () => {"));
    assert!(out.ends_with("})();"));
}

#[test]
fn nested_await_is_not_top_level() {
    let src = "export const f = async () => {\n  await ready();\n};\n";
    let out = transform(src, Dialect::Js, &to_cjs()).unwrap();

    assert!(out.contains("exports.f = f;"));
    assert!(!out.contains("__tla"));
}

#[test]
fn lowers_whole_object_export_to_export_default() {
    let src = "module.exports = function () {\n  return 1;\n};\n";
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("export default function ()"));
    assert!(!out.contains("module.exports"));
    assert!(!out.contains("__exports"));
}

#[test]
fn lowers_named_cjs_exports_to_reexport_statements() {
    let src = "exports.foo = 1;\nexports.bar = 2;\n";
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("let __exports = {};"));
    assert!(out.contains("export { __export_foo as foo };"));
    assert!(out.contains("export { __export_bar as bar };"));
    // No bare `exports` mention outside the generated surrogate.
    assert!(!out.replace("__exports", "").replace("__export_", "").contains("exports"));
}

#[test]
fn reexports_known_local_identifiers_directly() {
    let src = "const bump = () => 1;\nexports.bump = bump;\nmodule.exports.value = bump;\n";
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("export { bump };"));
    assert!(out.contains("export { bump as value };"));
}

#[test]
fn hoists_static_requires_into_imports() {
    let src = r#"require('./side.cjs');
const def = require('./def.cjs');
let counter = require('./counter.cjs');
const { a, b } = require('./named.cjs');
"#;
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("import './side.cjs';"));
    assert!(out.contains("import def from './def.cjs';"));
    assert!(out.contains("import __mod0 from './counter.cjs';"));
    assert!(out.contains("let counter = __mod0;"));
    assert!(out.contains("import * as __mod1 from './named.cjs';"));
    assert!(out.contains("const { a, b } = __mod1;"));
    assert!(!out.contains("require("));
}

#[test]
fn hoisted_destructure_with_specifier_rewrite() {
    let src = "const { a, b } = require('./m.js');\nconsole.log(a, b);\n";
    let out = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            rewrite_specifier: Some(SpecifierRewrite::Extension(".mjs".into())),
            ..to_esm()
        },
    )
    .unwrap();

    assert!(out.contains("import * as __mod0 from './m.mjs';"));
    assert!(out.contains("const { a, b } = __mod0;"));
}

#[test]
fn falls_back_to_create_require_for_dynamic_requires() {
    let src = "const target = './values.cjs';\nconst mod = require(target);\n";
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("import { createRequire } from 'node:module';"));
    assert!(out.contains("const require = createRequire(import.meta.url);"));
    assert!(out.contains("require(target)"));
}

#[test]
fn conditional_requires_are_not_hoisted() {
    let src = "let lazy;\nif (flag) {\n  lazy = require('./lazy.cjs');\n}\n";
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("require('./lazy.cjs')"));
    assert!(out.contains("createRequire(import.meta.url)"));
    assert!(!out.contains("import './lazy.cjs'"));
}

#[test]
fn redirects_exports_to_surrogate_with_shadow_awareness() {
    let src = r#"exports

const filename = exports
const thing = { exports: 'foo' }
thing.exports = 'boo'

function bar(exports) {
  const fn = exports
  return fn
}

exports = 'foo'
exports.obj = 1
"#;
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(out.contains("let __exports = {};"));
    assert!(out.contains("const filename = __exports"));
    // Object keys and member properties are not the CJS global.
    assert!(out.contains("{ exports: 'foo' }"));
    assert!(out.contains("thing.exports = 'boo'"));
    // The parameter shadows the global inside `bar`.
    assert!(out.contains("const fn = exports"));
    assert!(out.contains("__exports = 'foo'"));
    assert!(out.contains("__exports.obj = 1"));
}

#[test]
fn rejects_shadowed_module_globals() {
    let src = "let exports = {};\nexports.a = 1;\n";
    let err = transform(src, Dialect::Js, &to_esm()).unwrap_err();

    assert!(matches!(
        err,
        TransformError::Unsupported {
            kind: UnsupportedConstruct::ShadowedModuleGlobal,
            ..
        }
    ));
}

#[test]
fn rejects_eval_only_when_lowering_to_esm() {
    let src = "const result = eval('1 + 1');\nexports.result = result;\n";

    let err = transform(src, Dialect::Js, &to_esm()).unwrap_err();
    assert!(matches!(
        err,
        TransformError::Unsupported {
            kind: UnsupportedConstruct::Eval,
            ..
        }
    ));

    // The other direction tolerates eval.
    assert!(transform(src, Dialect::Js, &TransformOptions::default()).is_ok());
}

#[test]
fn rejects_with_statements() {
    let src = "with (obj) {\n  a;\n}\n";
    assert!(transform(src, Dialect::Js, &to_esm()).is_err());
}

#[test]
fn lowers_require_main_checks_per_policy() {
    let src = "if (require.main === module) {\n  console.log('cli');\n}\n";

    let shim = transform(src, Dialect::Js, &to_esm()).unwrap();
    assert!(shim.contains("(process.argv[1] === import.meta.filename)"));

    let warn = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            import_meta_main: ImportMetaMain::Warn,
            ..to_esm()
        },
    )
    .unwrap();
    assert!(warn.contains("if (import.meta.main)"));

    let err = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            import_meta_main: ImportMetaMain::Error,
            ..to_esm()
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        TransformError::Unsupported {
            kind: UnsupportedConstruct::ImportMetaMain,
            ..
        }
    ));

    let reversed = "if (module === require.main) {}\n";
    let out = transform(reversed, Dialect::Js, &to_esm()).unwrap();
    assert!(out.contains("(process.argv[1] === import.meta.filename)"));
}

#[test]
fn cjs_default_policy_gates_default_synthesis() {
    let src = "module.exports = { a: 1 };\nmodule.exports.b = 2;\n";

    // Two entries, so no in-place rewrite; Auto still synthesizes a default.
    let auto = transform(src, Dialect::Js, &to_esm()).unwrap();
    assert!(auto.contains("export default __exports;"));

    let none = transform(
        src,
        Dialect::Js,
        &TransformOptions {
            cjs_default: CjsDefault::None,
            ..to_esm()
        },
    )
    .unwrap();
    assert!(!none.contains("export default"));
}

#[test]
fn shadowed_require_disables_require_processing() {
    let src = "const require = () => 1;\nconst a = require('./x.cjs');\n";
    let out = transform(src, Dialect::Js, &to_esm()).unwrap();

    assert!(!out.contains("import "));
    assert!(!out.contains("createRequire"));
    assert!(out.contains("require('./x.cjs')"));
}

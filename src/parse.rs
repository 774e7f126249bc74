use swc_common::BytePos;
use swc_ecma_parser::{EsConfig, Parser, StringInput, Syntax, TsConfig};
use swc_ecma_visit::swc_ecma_ast as ast;

use crate::Dialect;

pub(crate) use swc_ecma_parser::error::Error as ParseError;

/// Parses `src` into a module using the dialect-appropriate syntax.
///
/// The input is anchored at [`BytePos`] `0`, so every span in the resulting
/// tree is a plain byte offset into `src`.
///
/// CommonJS sources are parsed as modules as well: `allow_return_outside_function`
/// covers top-level `return`, which is legal inside a CJS module wrapper.
pub(crate) fn parse_module(src: &str, dialect: Dialect) -> Result<ast::Module, ParseError> {
    tracing::trace_span!("parsing source").in_scope(|| {
        let input = StringInput::new(src, BytePos(0), BytePos(src.len() as u32));

        let mut parser = Parser::new(syntax_for(dialect), input, None);

        parser.parse_module()
    })
}

fn syntax_for(dialect: Dialect) -> Syntax {
    match dialect {
        Dialect::Js => Syntax::Es(EsConfig {
            allow_return_outside_function: true,
            ..Default::default()
        }),
        Dialect::Jsx => Syntax::Es(EsConfig {
            jsx: true,
            allow_return_outside_function: true,
            ..Default::default()
        }),
        Dialect::Ts => Syntax::Typescript(TsConfig::default()),
        Dialect::Tsx => Syntax::Typescript(TsConfig {
            tsx: true,
            ..Default::default()
        }),
    }
}

//! In-process minification for fallback bundles.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. Auxiliary scripts are
//! never minified.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::component::Category;

/// Minify a concatenated bundle. `None` if the category is not minifiable
/// or the source does not parse.
pub fn minify(category: Category, source: &str) -> Option<String> {
    match category {
        Category::Css => minify_css(source),
        Category::Js => minify_js(source),
        Category::Py => None,
    }
}

fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if !ret.errors.is_empty() {
        return None;
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let minified = Minifier::new(options).minify(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(minified.scoping)
        .build(&program)
        .code;
    Some(code)
}

fn minify_css(source: &str) -> Option<String> {
    let sheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(printed.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_css_collapses_whitespace() {
        let out = minify(Category::Css, ".card {\n  color: red;\n}\n").unwrap();
        assert_eq!(out, ".card{color:red}");
    }

    #[test]
    fn test_minify_js_shrinks() {
        let src = "function greet(name) {\n  return 'hi ' + name;\n}\nconsole.log(greet('x'));\n";
        let out = minify(Category::Js, src).unwrap();
        assert!(out.len() < src.len());
    }

    #[test]
    fn test_minify_invalid_js_returns_none() {
        assert!(minify(Category::Js, "function (").is_none());
    }

    #[test]
    fn test_py_never_minified() {
        assert!(minify(Category::Py, "print('x')").is_none());
    }
}

use log::{debug, trace};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::{Parser as OxcParser, ParserReturn};
use oxc_span::SourceType;

use crate::{
    constants::{PATTERN_EXTENSIONS, VUE_EXTENSION},
    extractor::{ImportExtractor, ImportSet, script_blocks},
};

/// Syntax-aware extractor backed by the oxc parser.
///
/// Compared to [`crate::PatternExtractor`] it ignores look-alikes in comments
/// and strings, skips type-only imports, and also reports re-exports, side-effect
/// imports and dynamic `import()` calls with literal specifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AstExtractor;

impl ImportExtractor for AstExtractor {
    fn extract(&self, source: &str, extension: &str) -> Vec<String> {
        let mut imports = ImportSet::default();

        if PATTERN_EXTENSIONS.contains(&extension) {
            collect_imports(source, source_type_for(extension), &mut imports);
        } else if extension == VUE_EXTENSION {
            // Script blocks may be `lang="ts"`; TypeScript mode accepts plain JS too
            for block in script_blocks(source) {
                collect_imports(block, source_type_for(".ts"), &mut imports);
            }
        }

        imports.into_vec()
    }
}

fn collect_imports(src: &str, st: SourceType, imports: &mut ImportSet) {
    let allocator = Allocator::default();
    let ParserReturn { program, errors, .. } = OxcParser::new(&allocator, src, st).parse();
    if !errors.is_empty() {
        debug!("Parser recovered from {} errors; using partial program", errors.len());
    }

    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                // Skip type-only imports (import type { Foo } from 'bar')
                if decl.import_kind.is_type() {
                    trace!("Skipping type-only import declaration");
                    continue;
                }

                // At least one runtime specifier keeps the import
                let has_runtime_import = if let Some(specifiers) = &decl.specifiers {
                    specifiers.iter().any(|spec| match spec {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => !s.import_kind.is_type(),
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => true,
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => true,
                    })
                } else {
                    // No specifiers means something like: import 'side-effect'
                    true
                };

                if has_runtime_import {
                    trace!("Found static import: '{}'", decl.source.value);
                    imports.insert(decl.source.value.as_str());
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                if !decl.export_kind.is_type() {
                    trace!("Found re-export: '{}'", decl.source.value);
                    imports.insert(decl.source.value.as_str());
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source
                    && !decl.export_kind.is_type()
                {
                    trace!("Found named re-export: '{}'", source.value);
                    imports.insert(source.value.as_str());
                }
            }
            Statement::ExpressionStatement(es) => {
                extract_require_from_expression(&es.expression, imports);
            }
            Statement::VariableDeclaration(vd) => {
                // Handle const x = require('...') or const x = someFunc(require('...'))
                for decl in &vd.declarations {
                    if let Some(init) = &decl.init {
                        extract_require_from_expression(init, imports);
                    }
                }
            }
            _ => {}
        }
    }
}

fn extract_require_from_expression(expr: &Expression, imports: &mut ImportSet) {
    match expr {
        Expression::CallExpression(ce) => {
            if let Expression::Identifier(callee_ident) = &ce.callee
                && callee_ident.name.as_str() == "require"
                && !ce.arguments.is_empty()
                && let Some(Expression::StringLiteral(sl)) = ce.arguments[0].as_expression()
            {
                trace!("Found require() call: '{}'", sl.value);
                imports.insert(sl.value.as_str());
            }
            // Nested calls such as loadConfig(require('./config'))
            for arg in &ce.arguments {
                if let Some(arg_expr) = arg.as_expression() {
                    extract_require_from_expression(arg_expr, imports);
                }
            }
            extract_require_from_expression(&ce.callee, imports);
        }
        Expression::ImportExpression(ie) => {
            if let Expression::StringLiteral(sl) = &ie.source {
                trace!("Found dynamic import(): '{}'", sl.value);
                imports.insert(sl.value.as_str());
            }
        }
        Expression::ArrayExpression(ae) => {
            for elem in &ae.elements {
                if let Some(expr) = elem.as_expression() {
                    extract_require_from_expression(expr, imports);
                }
            }
        }
        Expression::ObjectExpression(oe) => {
            for prop in &oe.properties {
                if let Some(expr) = prop.as_property() {
                    extract_require_from_expression(&expr.value, imports);
                }
            }
        }
        Expression::ConditionalExpression(ce) => {
            extract_require_from_expression(&ce.test, imports);
            extract_require_from_expression(&ce.consequent, imports);
            extract_require_from_expression(&ce.alternate, imports);
        }
        Expression::AssignmentExpression(ae) => {
            extract_require_from_expression(&ae.right, imports);
        }
        Expression::ParenthesizedExpression(pe) => {
            extract_require_from_expression(&pe.expression, imports);
        }
        _ => {}
    }
}

fn source_type_for(extension: &str) -> SourceType {
    SourceType::default()
        .with_jsx(matches!(extension, ".tsx" | ".jsx"))
        .with_typescript(matches!(extension, ".ts" | ".tsx"))
        .with_module(true)
}

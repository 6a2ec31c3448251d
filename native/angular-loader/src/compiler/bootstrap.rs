//! Rewrites bootstrap calls so the running application can be disposed.
//!
//! `bootstrapApplication(App)` becomes
//! `Promise.resolve(bootstrapApplication(App)).then((ref) => { window.ngRef = ref; return ref; })`.
//! The reload snippet for entry files destroys `window.ngRef` before a new
//! version of the module runs.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{CallExpression, Expression, ExpressionStatement};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;

use super::SourceTransformer;
use crate::classify::{callee_name, source_type_for, BOOTSTRAP_PREFIX};
use crate::error::{BuildError, Result};
use crate::instrument::APP_REF_GLOBAL;

#[derive(Debug, Default, Clone, Copy)]
pub struct BootstrapRewriter;

const PROMISE_CHAIN: [&str; 3] = ["then", "catch", "finally"];

/// Collects spans of bootstrap calls whose result the module discards or
/// chains on: `bootstrapX(..);`, `await bootstrapX(..);` and
/// `bootstrapX(..).then(..)`. Calls bound to a name or passed as arguments
/// are left alone.
struct BootstrapCalls {
    spans: Vec<(u32, u32)>,
}

fn entry_call<'e, 'a>(expr: &'e Expression<'a>) -> Option<&'e CallExpression<'a>> {
    match expr {
        Expression::CallExpression(call) => {
            if callee_name(&call.callee).is_some_and(|name| name.starts_with(BOOTSTRAP_PREFIX)) {
                return Some(&**call);
            }
            match &call.callee {
                Expression::StaticMemberExpression(member)
                    if PROMISE_CHAIN.contains(&member.property.name.as_str()) =>
                {
                    entry_call(&member.object)
                }
                _ => None,
            }
        }
        Expression::AwaitExpression(await_expr) => entry_call(&await_expr.argument),
        Expression::ParenthesizedExpression(paren) => entry_call(&paren.expression),
        _ => None,
    }
}

impl<'a> Visit<'a> for BootstrapCalls {
    fn visit_expression_statement(&mut self, it: &ExpressionStatement<'a>) {
        if let Some(call) = entry_call(&it.expression) {
            self.spans.push((call.span.start, call.span.end));
            return;
        }
        walk::walk_expression_statement(self, it);
    }
}

impl BootstrapRewriter {
    pub fn rewrite(&self, path: &Path, source: &str) -> Result<String> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, source_type_for(path)).parse();
        if ret.panicked {
            return Err(BuildError::Parse {
                path: path.to_path_buf(),
                message: "unrecoverable syntax error".to_string(),
            });
        }

        let mut calls = BootstrapCalls { spans: Vec::new() };
        calls.visit_program(&ret.program);
        if calls.spans.is_empty() {
            return Ok(source.to_string());
        }

        // Spans never overlap; splice back to front so offsets stay valid.
        calls.spans.sort_by(|a, b| b.0.cmp(&a.0));
        let mut out = source.to_string();
        for (start, end) in calls.spans {
            let (start, end) = (start as usize, end as usize);
            let wrapped = format!(
                "Promise.resolve({}).then((ref) => {{ window.{} = ref; return ref; }})",
                &source[start..end],
                APP_REF_GLOBAL
            );
            out.replace_range(start..end, &wrapped);
        }

        tracing::debug!("wrapped bootstrap call(s) in {}", path.display());
        Ok(out)
    }
}

impl SourceTransformer for BootstrapRewriter {
    fn name(&self) -> &'static str {
        "replace-bootstrap"
    }

    fn transform(&self, path: &Path, source: &str) -> Result<String> {
        self.rewrite(path, source)
    }
}

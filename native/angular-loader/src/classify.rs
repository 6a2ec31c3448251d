//! File classification.
//!
//! A source file is reduced to a [`SyntaxOutline`]: only call expressions and
//! class declarations survive, nested the way they appear in the source.
//! [`classify`] is a pure function over that outline, so it can be tested with
//! hand-built trees. [`outline_source`] builds the outline from real source
//! text using oxc.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{CallExpression, Class, ClassType, Expression, Program};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};

/// Callee prefix that marks an application entry point.
pub const BOOTSTRAP_PREFIX: &str = "bootstrap";

/// Decorators that make a class a framework building block.
pub const FRAMEWORK_DECORATORS: [&str; 5] =
    ["Component", "Directive", "Pipe", "NgModule", "Injectable"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceClassification {
    EntryBootstrap,
    FrameworkDecorated,
    PlainModule,
}

impl SourceClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceClassification::EntryBootstrap => "EntryBootstrap",
            SourceClassification::FrameworkDecorated => "FrameworkDecorated",
            SourceClassification::PlainModule => "PlainModule",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "EntryBootstrap" => Some(SourceClassification::EntryBootstrap),
            "FrameworkDecorated" => Some(SourceClassification::FrameworkDecorated),
            "PlainModule" => Some(SourceClassification::PlainModule),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTLINE IR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decorator {
    /// `@Name(...)`
    Call(String),
    /// Anything else: `@Name`, `@ns.Name(...)`, ...
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineNode {
    Call {
        /// Identifier or member property being called, if it has a name.
        callee: Option<String>,
        children: Vec<OutlineNode>,
    },
    Class {
        declaration: bool,
        decorators: Vec<Decorator>,
        children: Vec<OutlineNode>,
    },
}

impl OutlineNode {
    pub fn children(&self) -> &[OutlineNode] {
        match self {
            OutlineNode::Call { children, .. } | OutlineNode::Class { children, .. } => children,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxOutline {
    pub nodes: Vec<OutlineNode>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Classifies a file. A bootstrap call wins over a decorated class, and the
/// walk stops at the first bootstrap call it sees.
pub fn classify(outline: &SyntaxOutline) -> SourceClassification {
    let mut decorated = false;
    let mut worklist: Vec<&OutlineNode> = outline.nodes.iter().rev().collect();

    while let Some(node) = worklist.pop() {
        match node {
            OutlineNode::Call {
                callee: Some(name), ..
            } if name.starts_with(BOOTSTRAP_PREFIX) => {
                return SourceClassification::EntryBootstrap;
            }
            OutlineNode::Class {
                declaration: true,
                decorators,
                ..
            } if !decorated => {
                decorated = decorators.iter().any(is_framework_decorator);
            }
            _ => {}
        }
        worklist.extend(node.children().iter().rev());
    }

    if decorated {
        SourceClassification::FrameworkDecorated
    } else {
        SourceClassification::PlainModule
    }
}

fn is_framework_decorator(decorator: &Decorator) -> bool {
    match decorator {
        Decorator::Call(name) => FRAMEWORK_DECORATORS.contains(&name.as_str()),
        Decorator::Other => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OXC LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Name of the function being called: `foo()` -> `foo`, `a.b.foo()` -> `foo`.
pub(crate) fn callee_name<'a>(callee: &'a Expression<'_>) -> Option<&'a str> {
    match callee {
        Expression::Identifier(ident) => Some(ident.name.as_str()),
        Expression::StaticMemberExpression(member) => Some(member.property.name.as_str()),
        _ => None,
    }
}

struct OutlineBuilder {
    stack: Vec<Vec<OutlineNode>>,
}

impl OutlineBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Vec::new()],
        }
    }

    fn push(&mut self, node: OutlineNode) {
        if let Some(top) = self.stack.last_mut() {
            top.push(node);
        }
    }

    fn finish(mut self) -> SyntaxOutline {
        SyntaxOutline {
            nodes: self.stack.pop().unwrap_or_default(),
        }
    }
}

impl<'a> Visit<'a> for OutlineBuilder {
    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        self.stack.push(Vec::new());
        walk::walk_call_expression(self, it);
        let children = self.stack.pop().unwrap_or_default();
        self.push(OutlineNode::Call {
            callee: callee_name(&it.callee).map(str::to_string),
            children,
        });
    }

    fn visit_class(&mut self, it: &Class<'a>) {
        let decorators = it
            .decorators
            .iter()
            .map(|decorator| match &decorator.expression {
                Expression::CallExpression(call) => match &call.callee {
                    Expression::Identifier(ident) => Decorator::Call(ident.name.to_string()),
                    _ => Decorator::Other,
                },
                _ => Decorator::Other,
            })
            .collect();

        self.stack.push(Vec::new());
        walk::walk_class(self, it);
        let children = self.stack.pop().unwrap_or_default();
        self.push(OutlineNode::Class {
            declaration: matches!(it.r#type, ClassType::ClassDeclaration),
            decorators,
            children,
        });
    }
}

pub fn outline_program(program: &Program<'_>) -> SyntaxOutline {
    let mut builder = OutlineBuilder::new();
    builder.visit_program(program);
    builder.finish()
}

/// Source type used to parse `path`. Unknown extensions parse as TypeScript.
pub fn source_type_for(path: &Path) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| SourceType::ts())
}

/// Parses `source` and builds its outline. Parse errors are logged; whatever
/// oxc recovered is still outlined.
pub fn outline_source(source: &str, source_type: SourceType, path: &Path) -> SyntaxOutline {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        tracing::debug!(
            "{} parse error(s) while classifying {}",
            ret.errors.len(),
            path.display()
        );
    }
    outline_program(&ret.program)
}

/// Parses and classifies in one step.
pub fn classify_source(source: &str, source_type: SourceType, path: &Path) -> SourceClassification {
    let classification = classify(&outline_source(source, source_type, path));
    tracing::trace!("{} classified as {}", path.display(), classification.as_str());
    classification
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi_derive::napi]
pub fn classify_source_native(code: String, file_path: String) -> String {
    let path = Path::new(&file_path);
    classify_source(&code, source_type_for(path), path)
        .as_str()
        .to_string()
}

//! Component resources for the reference compiler.
//!
//! `@Component({...})` metadata may point at external files (`templateUrl`,
//! `styleUrl`, `styleUrls`) or carry inline `styles`. Analysis resolves them
//! through the [`ResourceHost`]; emit splices the results back in as inline
//! `template` / `styles` properties.

use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, Class, Expression, ObjectPropertyKind, PropertyKey,
    TemplateLiteral,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;

use crate::classify::source_type_for;
use crate::error::Result;
use crate::instrument::escape_js_string;
use crate::paths::normalize;
use crate::resource::{ResourceContext, ResourceHost, ResourceKind};
use crate::unit::content_hash;

const COMPONENT_DECORATOR: &str = "Component";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropertyKind {
    TemplateUrl,
    StyleUrls,
    InlineStyles,
}

/// One resource-bearing metadata property with literal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResourceProperty {
    pub kind: PropertyKind,
    pub span: (u32, u32),
    pub values: Vec<String>,
}

/// What a single parse of a root file yields.
#[derive(Debug, Default)]
pub(crate) struct FileScan {
    pub syntax_errors: usize,
    pub properties: Vec<ResourceProperty>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ResolvedResources {
    pub replacements: Vec<(u32, u32, String)>,
    /// External files read, with the content hash of their text.
    pub files: Vec<(PathBuf, String)>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN
// ═══════════════════════════════════════════════════════════════════════════════

fn property_kind(key: &PropertyKey<'_>) -> Option<PropertyKind> {
    let name = match key {
        PropertyKey::StaticIdentifier(ident) => ident.name.as_str(),
        PropertyKey::StringLiteral(lit) => lit.value.as_str(),
        _ => return None,
    };
    match name {
        "templateUrl" => Some(PropertyKind::TemplateUrl),
        "styleUrl" | "styleUrls" => Some(PropertyKind::StyleUrls),
        "styles" => Some(PropertyKind::InlineStyles),
        _ => None,
    }
}

fn template_text(template: &TemplateLiteral<'_>) -> Option<String> {
    if !template.expressions.is_empty() {
        return None;
    }
    template.quasis.first().map(|quasi| match &quasi.value.cooked {
        Some(cooked) => cooked.to_string(),
        None => quasi.value.raw.to_string(),
    })
}

/// Literal string values of a property, or `None` if any part is dynamic.
fn literal_values(value: &Expression<'_>) -> Option<Vec<String>> {
    match value {
        Expression::StringLiteral(lit) => Some(vec![lit.value.to_string()]),
        Expression::TemplateLiteral(template) => template_text(template).map(|t| vec![t]),
        Expression::ArrayExpression(array) => array
            .elements
            .iter()
            .map(|element| match element {
                ArrayExpressionElement::StringLiteral(lit) => Some(lit.value.to_string()),
                ArrayExpressionElement::TemplateLiteral(template) => template_text(template),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

struct ComponentMetadata {
    properties: Vec<ResourceProperty>,
}

impl<'a> Visit<'a> for ComponentMetadata {
    fn visit_class(&mut self, it: &Class<'a>) {
        for decorator in &it.decorators {
            let Expression::CallExpression(call) = &decorator.expression else {
                continue;
            };
            let is_component = matches!(
                &call.callee,
                Expression::Identifier(ident) if ident.name.as_str() == COMPONENT_DECORATOR
            );
            if !is_component {
                continue;
            }
            let Some(Argument::ObjectExpression(metadata)) = call.arguments.first() else {
                continue;
            };

            for property in &metadata.properties {
                let ObjectPropertyKind::ObjectProperty(prop) = property else {
                    continue;
                };
                let Some(kind) = property_kind(&prop.key) else {
                    continue;
                };
                match literal_values(&prop.value) {
                    Some(values) if !values.is_empty() => self.properties.push(ResourceProperty {
                        kind,
                        span: (prop.span.start, prop.span.end),
                        values,
                    }),
                    _ => {}
                }
            }
        }
        walk::walk_class(self, it);
    }
}

/// Parses `source` once, counting syntax errors and collecting component
/// resource properties.
pub(crate) fn scan_file(path: &Path, source: &str) -> FileScan {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type_for(path)).parse();

    let mut metadata = ComponentMetadata {
        properties: Vec::new(),
    };
    metadata.visit_program(&ret.program);

    FileScan {
        syntax_errors: ret.errors.len(),
        properties: metadata.properties,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVE
// ═══════════════════════════════════════════════════════════════════════════════

fn styles_property(styles: &[String]) -> String {
    let items = styles
        .iter()
        .map(|css| format!("'{}'", escape_js_string(css)))
        .collect::<Vec<_>>();
    format!("styles: [{}]", items.join(", "))
}

/// Reads external resources and runs styles through the host. A missing
/// file fails with `ResourceNotFound`.
pub(crate) async fn resolve(
    host: &ResourceHost,
    containing_file: &Path,
    properties: &[ResourceProperty],
) -> Result<ResolvedResources> {
    let dir = containing_file.parent().unwrap_or_else(|| Path::new(""));
    let mut out = ResolvedResources::default();

    for property in properties {
        let (start, end) = property.span;
        match property.kind {
            PropertyKind::TemplateUrl => {
                let Some(url) = property.values.first() else {
                    continue;
                };
                let file = normalize(&dir.join(url));
                let template = host.read_resource(&file).await?;
                out.files.push((file, content_hash(&template)));
                out.replacements.push((
                    start,
                    end,
                    format!("template: '{}'", escape_js_string(&template)),
                ));
            }
            PropertyKind::StyleUrls => {
                let mut styles = Vec::with_capacity(property.values.len());
                for url in &property.values {
                    let file = normalize(&dir.join(url));
                    let css = host.read_resource(&file).await?;
                    out.files.push((file.clone(), content_hash(&css)));
                    let context = ResourceContext {
                        kind: ResourceKind::Style,
                        resource_file: Some(file.clone()),
                        containing_file: containing_file.to_path_buf(),
                    };
                    let css = match host.transform_resource(&css, &context).await {
                        Some(transformed) => transformed.content,
                        None => css,
                    };
                    styles.push(css);
                }
                out.replacements.push((start, end, styles_property(&styles)));
            }
            PropertyKind::InlineStyles => {
                let context = ResourceContext {
                    kind: ResourceKind::Style,
                    resource_file: None,
                    containing_file: containing_file.to_path_buf(),
                };
                let mut styles = Vec::with_capacity(property.values.len());
                let mut transformed_any = false;
                for css in &property.values {
                    match host.transform_resource(css, &context).await {
                        Some(transformed) => {
                            styles.push(transformed.content);
                            transformed_any = true;
                        }
                        None => styles.push(css.clone()),
                    }
                }
                if transformed_any {
                    out.replacements.push((start, end, styles_property(&styles)));
                }
            }
        }
    }

    Ok(out)
}

/// Applies non-overlapping span replacements.
pub(crate) fn splice(source: &str, replacements: &[(u32, u32, String)]) -> String {
    let mut ordered: Vec<_> = replacements.iter().collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = source.to_string();
    for (start, end, text) in ordered {
        out.replace_range(*start as usize..*end as usize, text);
    }
    out
}

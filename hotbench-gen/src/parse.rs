//! Class Parsing
//!
//! Reads benchmark declarations out of a class with `syn`, then rewrites the
//! class into a module the harness crate can call into: benchmark functions
//! become `pub(crate)` and every hotbench attribute is stripped.

use crate::RUNTIME_MODULE;
use crate::error::GenerationError;
use crate::source::BenchmarkClass;
use hotbench_engine::HintDirective;
use quote::ToTokens;
use syn::spanned::Spanned;
use syn::{Attribute, ImplItem, Item, ItemFn};

const BENCHMARK: &str = "benchmark";
const FORK: &str = "fork";
const WARMUP: &str = "warmup";
const MEASUREMENT: &str = "measurement";
const COMPILER_CONTROL: &str = "compiler_control";

/// Names a class may not take: they collide with generated modules or the
/// crates every harness links against.
const RESERVED_NAMES: &[&str] = &[RUNTIME_MODULE, "harness", "std", "core", "alloc"];

// Helpers for attribute arguments, one per literal kind.
mod attr {
    use syn::meta::ParseNestedMeta;

    /// Get the attribute name as a string
    pub fn name(meta: &ParseNestedMeta) -> String {
        meta.path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default()
    }

    /// Parse an integer literal attribute: `attr = 42`
    pub fn int<T>(meta: &ParseNestedMeta) -> syn::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let value: syn::LitInt = meta.value()?.parse()?;
        value.base10_parse()
    }

    /// Parse a duration string attribute into nanoseconds: `attr = "500ms"`
    pub fn duration_ns(meta: &ParseNestedMeta) -> syn::Result<u64> {
        let value: syn::LitStr = meta.value()?.parse()?;
        let duration = hotbench_engine::parse_duration(&value.value())
            .map_err(|e| syn::Error::new(value.span(), e))?;
        Ok(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Create an unknown attribute error
    pub fn unknown(meta: &ParseNestedMeta, name: &str) -> syn::Error {
        meta.error(format!("unknown attribute: {}", name))
    }
}

/// Execution settings declared on a class or a benchmark method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionAttrs {
    /// `fork(N)`
    pub forks: Option<u32>,
    /// `warmup(iterations = N)`
    pub warmup_iterations: Option<u32>,
    /// `warmup(time = "...")`, in nanoseconds
    pub warmup_time_ns: Option<u64>,
    /// `measurement(iterations = N)`
    pub measurement_iterations: Option<u32>,
    /// `measurement(time = "...")`, in nanoseconds
    pub measurement_time_ns: Option<u64>,
}

impl ExecutionAttrs {
    /// These settings, falling back to `outer` for anything unset
    pub fn or(self, outer: ExecutionAttrs) -> Self {
        Self {
            forks: self.forks.or(outer.forks),
            warmup_iterations: self.warmup_iterations.or(outer.warmup_iterations),
            warmup_time_ns: self.warmup_time_ns.or(outer.warmup_time_ns),
            measurement_iterations: self.measurement_iterations.or(outer.measurement_iterations),
            measurement_time_ns: self.measurement_time_ns.or(outer.measurement_time_ns),
        }
    }
}

/// A `#[benchmark]` function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkMethod {
    /// Function name
    pub name: String,
    /// 1-based line of the function name
    pub line: usize,
    /// Effective settings, class settings already applied
    pub attrs: ExecutionAttrs,
    /// `compiler_control` directive
    pub control: Option<HintDirective>,
}

/// A class after parsing
#[derive(Debug, Clone)]
pub struct ParsedClass {
    /// Class name
    pub name: String,
    /// Class-wide settings
    pub attrs: ExecutionAttrs,
    /// Benchmarks, in declaration order
    pub methods: Vec<BenchmarkMethod>,
    /// Rewritten module source
    pub module_source: String,
}

impl ParsedClass {
    /// Registry id of `method`
    pub fn benchmark_id(&self, method: &BenchmarkMethod) -> String {
        format!("{}::{}", self.name, method.name)
    }
}

/// Check that `name` can be used as a class (module) name
pub(crate) fn validate_class_name(name: &str) -> Result<(), GenerationError> {
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && syn::parse_str::<syn::Ident>(name).is_ok();
    if !plain {
        return Err(GenerationError::in_class(
            name,
            "class name must be a plain Rust identifier",
        ));
    }
    if RESERVED_NAMES.contains(&name) || name.starts_with("__hotbench") {
        return Err(GenerationError::in_class(name, "class name is reserved"));
    }
    Ok(())
}

/// Parse `class`, collecting every problem found rather than the first
pub fn parse_class(class: &BenchmarkClass) -> Result<ParsedClass, Vec<GenerationError>> {
    let name = class.name();
    validate_class_name(name).map_err(|e| vec![e])?;

    let located = |span: proc_macro2::Span, message: String| {
        GenerationError::in_class(name, message).at_line(span.start().line)
    };

    let mut file = syn::parse_file(class.source())
        .map_err(|e| vec![located(e.span(), format!("cannot parse class: {e}"))])?;

    let mut errors = Vec::new();

    let class_attrs = {
        let (ours, rest) = split_attrs(std::mem::take(&mut file.attrs));
        file.attrs = rest;
        let mut attrs = ExecutionAttrs::default();
        for attr in &ours {
            if let Err(e) = apply_class_attr(attr, &mut attrs) {
                errors.push(located(e.span(), e.to_string()));
            }
        }
        attrs
    };

    let mut methods = Vec::new();
    for item in &mut file.items {
        match item {
            Item::Fn(func) => match parse_method(func, class_attrs) {
                Ok(Some(method)) => methods.push(method),
                Ok(None) => {}
                Err(errs) => {
                    errors.extend(errs.into_iter().map(|e| located(e.span(), e.to_string())))
                }
            },
            Item::Impl(imp) => {
                let misplaced = imp.items.iter().filter_map(|i| match i {
                    ImplItem::Fn(f) if f.attrs.iter().any(|a| is_named(a, BENCHMARK)) => {
                        Some(&f.sig.ident)
                    }
                    _ => None,
                });
                for ident in misplaced {
                    errors.push(located(
                        ident.span(),
                        format!("benchmark `{ident}` must be a free function"),
                    ));
                }
            }
            _ => {}
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    if methods.is_empty() {
        tracing::warn!(class = %name, "class declares no benchmarks");
    }

    Ok(ParsedClass {
        name: name.to_string(),
        attrs: class_attrs,
        methods,
        module_source: file.into_token_stream().to_string(),
    })
}

fn is_named(attr: &Attribute, name: &str) -> bool {
    attr.path().is_ident(name)
}

fn is_ours(attr: &Attribute) -> bool {
    [BENCHMARK, FORK, WARMUP, MEASUREMENT, COMPILER_CONTROL]
        .iter()
        .any(|n| is_named(attr, n))
}

fn split_attrs(attrs: Vec<Attribute>) -> (Vec<Attribute>, Vec<Attribute>) {
    attrs.into_iter().partition(is_ours)
}

fn apply_class_attr(attr: &Attribute, out: &mut ExecutionAttrs) -> syn::Result<()> {
    if is_named(attr, FORK) {
        let forks: syn::LitInt = attr.parse_args()?;
        out.forks = Some(forks.base10_parse()?);
        return Ok(());
    }

    let warmup = is_named(attr, WARMUP);
    if !warmup && !is_named(attr, MEASUREMENT) {
        return Err(syn::Error::new(
            attr.span(),
            "only `fork`, `warmup` and `measurement` apply to a class",
        ));
    }

    let mut iterations = None;
    let mut time = None;
    attr.parse_nested_meta(|meta| {
        match attr::name(&meta).as_str() {
            "iterations" => iterations = Some(attr::int(&meta)?),
            "time" => time = Some(attr::duration_ns(&meta)?),
            other => return Err(attr::unknown(&meta, other)),
        }
        Ok(())
    })?;

    if warmup {
        out.warmup_iterations = iterations.or(out.warmup_iterations);
        out.warmup_time_ns = time.or(out.warmup_time_ns);
    } else {
        out.measurement_iterations = iterations.or(out.measurement_iterations);
        out.measurement_time_ns = time.or(out.measurement_time_ns);
    }
    Ok(())
}

fn parse_control(attr: &Attribute) -> syn::Result<HintDirective> {
    let mode: syn::Ident = attr.parse_args()?;
    match mode.to_string().as_str() {
        "inline" => Ok(HintDirective::Inline),
        "dont_inline" => Ok(HintDirective::DontInline),
        other => Err(syn::Error::new(
            mode.span(),
            format!("unknown compiler control `{other}` (expected inline or dont_inline)"),
        )),
    }
}

/// Parse one function. `Ok(None)` when it is not a benchmark; the function is
/// rewritten in place when it is.
fn parse_method(
    func: &mut ItemFn,
    class_attrs: ExecutionAttrs,
) -> Result<Option<BenchmarkMethod>, Vec<syn::Error>> {
    let has_ours = func.attrs.iter().any(is_ours);
    if !has_ours {
        return Ok(None);
    }

    let (ours, rest) = split_attrs(std::mem::take(&mut func.attrs));
    func.attrs = rest;

    let mut errors = Vec::new();
    let ident = &func.sig.ident;

    if !ours.iter().any(|a| is_named(a, BENCHMARK)) {
        errors.push(syn::Error::new(
            ident.span(),
            format!("`{ident}` carries benchmark settings but is not marked #[benchmark]"),
        ));
        return Err(errors);
    }

    let mut attrs = ExecutionAttrs::default();
    let mut control = None;
    for attr in &ours {
        let applied = if is_named(attr, BENCHMARK) {
            attr.meta.require_path_only().map(|_| ())
        } else if is_named(attr, COMPILER_CONTROL) {
            parse_control(attr).map(|c| control = Some(c))
        } else {
            apply_class_attr(attr, &mut attrs)
        };
        if let Err(e) = applied {
            errors.push(e);
        }
    }

    let sig = &func.sig;
    if !sig.inputs.is_empty() {
        errors.push(syn::Error::new(
            sig.inputs.span(),
            format!("benchmark `{ident}` must not take arguments"),
        ));
    }
    if sig.asyncness.is_some() {
        errors.push(syn::Error::new(
            ident.span(),
            format!("benchmark `{ident}` must not be async"),
        ));
    }
    if sig.unsafety.is_some() {
        errors.push(syn::Error::new(
            ident.span(),
            format!("benchmark `{ident}` must not be unsafe"),
        ));
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        errors.push(syn::Error::new(
            sig.generics.span(),
            format!("benchmark `{ident}` must not be generic"),
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let method = BenchmarkMethod {
        name: ident.to_string(),
        line: ident.span().start().line,
        attrs: attrs.or(class_attrs),
        control,
    };
    func.vis = syn::parse_quote!(pub(crate));
    Ok(Some(method))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<ParsedClass, Vec<GenerationError>> {
        parse_class(&BenchmarkClass::new("sample", source))
    }

    #[test]
    fn test_class_and_method_attributes() {
        let parsed = parse(
            r#"
#![fork(2)]
#![warmup(iterations = 4, time = "20ms")]

fn helper() -> u64 { 3 }

#[benchmark]
fn plain() -> u64 { helper() }

#[benchmark]
#[measurement(iterations = 7)]
#[warmup(time = "1ms")]
#[compiler_control(dont_inline)]
fn tuned() {}
"#,
        )
        .unwrap();

        assert_eq!(parsed.attrs.forks, Some(2));
        assert_eq!(parsed.methods.len(), 2);

        let plain = &parsed.methods[0];
        assert_eq!(plain.name, "plain");
        assert_eq!(plain.line, 8);
        assert_eq!(plain.attrs.forks, Some(2));
        assert_eq!(plain.attrs.warmup_iterations, Some(4));
        assert_eq!(plain.attrs.warmup_time_ns, Some(20_000_000));
        assert_eq!(plain.control, None);

        let tuned = &parsed.methods[1];
        assert_eq!(tuned.attrs.measurement_iterations, Some(7));
        assert_eq!(tuned.attrs.warmup_time_ns, Some(1_000_000));
        assert_eq!(tuned.attrs.warmup_iterations, Some(4));
        assert_eq!(tuned.control, Some(HintDirective::DontInline));
        assert_eq!(parsed.benchmark_id(tuned), "sample::tuned");
    }

    #[test]
    fn test_module_source_is_rewritten() {
        let parsed = parse("#![warmup(iterations = 1)]\n#[benchmark]\nfn run() {}\n").unwrap();
        let module = &parsed.module_source;
        assert!(module.contains("pub (crate) fn run"));
        assert!(!module.contains("benchmark"));
        assert!(!module.contains("warmup"));
    }

    #[test]
    fn test_invalid_signatures_are_all_reported() {
        let errors = parse(
            "#[benchmark]\nfn takes(x: u32) {}\n\n#[benchmark]\nasync fn waits() {}\n\n#[benchmark]\nfn generic<T>() {}\n",
        )
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].line, Some(2));
        assert!(errors[0].message.contains("must not take arguments"));
        assert!(errors[1].message.contains("must not be async"));
        assert!(errors[2].message.contains("must not be generic"));
        assert!(errors.iter().all(|e| e.class.as_deref() == Some("sample")));
    }

    #[test]
    fn test_syntax_error_has_line() {
        let errors = parse("#[benchmark]\nfn broken( {}\n").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("cannot parse class"));
        assert!(errors[0].line.is_some());
    }

    #[test]
    fn test_bad_attribute_arguments() {
        let errors = parse(
            "#![warmup(rounds = 3)]\n#[benchmark]\n#[compiler_control(exclude)]\nfn a() {}\n",
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("unknown attribute: rounds"));
        assert_eq!(errors[0].line, Some(1));
        assert!(errors[1].message.contains("unknown compiler control"));
    }

    #[test]
    fn test_settings_without_benchmark_marker() {
        let errors = parse("#[fork(3)]\nfn not_marked() {}\n").unwrap_err();
        assert!(errors[0].message.contains("not marked #[benchmark]"));
    }

    #[test]
    fn test_benchmark_in_impl_block() {
        let errors = parse("struct S;\nimpl S {\n    #[benchmark]\n    fn m() {}\n}\n").unwrap_err();
        assert_eq!(errors[0].line, Some(4));
        assert!(errors[0].message.contains("must be a free function"));
    }

    #[test]
    fn test_class_names() {
        assert!(validate_class_name("sorting").is_ok());
        assert!(validate_class_name("Sorting2").is_ok());
        assert!(validate_class_name("r#type").is_err());
        assert!(validate_class_name("fn").is_err());
        assert!(validate_class_name("has-dash").is_err());
        assert!(validate_class_name("").is_err());
        assert!(validate_class_name("harness").is_err());
        assert!(validate_class_name(RUNTIME_MODULE).is_err());
        assert!(validate_class_name("__hotbench_0").is_err());
    }

    #[test]
    fn test_class_without_benchmarks() {
        let parsed = parse("pub fn helper() {}\n").unwrap();
        assert!(parsed.methods.is_empty());
    }
}

//! Harness Generation

use crate::destination::GeneratorDestination;
use crate::error::GenerationError;
use crate::parse::{ParsedClass, parse_class};
use crate::source::BenchmarkClass;
use crate::{HARNESS_ROOT, RUNTIME_MODULE, RUNTIME_SOURCE};
use hotbench_engine::{
    BENCHMARK_LIST, BenchmarkEntry, BenchmarkList, COMPILER_HINTS, CompilerHint, CompilerHints,
};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use rayon::prelude::*;
use std::collections::HashSet;

/// Generates one harness executable's sources from benchmark classes.
///
/// [`generate`](Self::generate) may be called several times; [`complete`](Self::complete)
/// then writes the crate root and the engine resources for every class seen.
#[derive(Debug)]
pub struct BenchmarkGenerator {
    harness: String,
    classes: Vec<ParsedClass>,
    seen: HashSet<String>,
}

impl BenchmarkGenerator {
    /// Generator for a harness executable named `harness`
    pub fn new(harness: impl Into<String>) -> Self {
        Self {
            harness: harness.into(),
            classes: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Harness executable name recorded in the registry
    pub fn harness(&self) -> &str {
        &self.harness
    }

    /// Classes generated so far
    pub fn classes(&self) -> &[ParsedClass] {
        &self.classes
    }

    /// Parse `classes` and write one module per class to `dest`.
    ///
    /// Every problem is reported to `dest`; a class with errors is skipped
    /// and the remaining classes are still generated.
    pub fn generate<D>(&mut self, classes: &[BenchmarkClass], dest: &mut D)
    where
        D: GeneratorDestination + ?Sized,
    {
        let mut unique = Vec::with_capacity(classes.len());
        for class in classes {
            if self.seen.insert(class.name().to_string()) {
                unique.push(class);
            } else {
                dest.print_error(GenerationError::in_class(
                    class.name(),
                    "class is declared more than once",
                ));
            }
        }

        let parsed: Vec<_> = unique.par_iter().map(|class| parse_class(class)).collect();

        for outcome in parsed {
            match outcome {
                Ok(class) => {
                    tracing::debug!(
                        class = %class.name,
                        benchmarks = class.methods.len(),
                        "generated class module"
                    );
                    dest.write_source(&format!("{}.rs", class.name), &class.module_source);
                    self.classes.push(class);
                }
                Err(errors) => {
                    for error in errors {
                        dest.print_error(error);
                    }
                }
            }
        }
    }

    /// Write the runtime module, the harness crate root, the benchmark
    /// registry and the compiler hints.
    pub fn complete<D>(&mut self, dest: &mut D)
    where
        D: GeneratorDestination + ?Sized,
    {
        dest.write_source(&format!("{RUNTIME_MODULE}.rs"), RUNTIME_SOURCE);
        dest.write_source(HARNESS_ROOT, &self.harness_root().to_string());

        match self.registry().to_text() {
            Ok(text) => dest.write_resource(BENCHMARK_LIST, &text),
            Err(e) => dest.print_error(GenerationError::new(format!(
                "cannot render benchmark registry: {e}"
            ))),
        }
        dest.write_resource(COMPILER_HINTS, &self.compiler_hints().to_text());
    }

    /// Registry listing every generated benchmark
    pub fn registry(&self) -> BenchmarkList {
        let entries = self
            .classes
            .iter()
            .flat_map(|class| {
                class.methods.iter().map(move |method| {
                    let mut entry = BenchmarkEntry::new(&class.name, &method.name, &self.harness);
                    entry.forks = method.attrs.forks;
                    entry.warmup_iterations = method.attrs.warmup_iterations;
                    entry.warmup_time_ns = method.attrs.warmup_time_ns;
                    entry.measurement_iterations = method.attrs.measurement_iterations;
                    entry.measurement_time_ns = method.attrs.measurement_time_ns;
                    entry
                })
            })
            .collect();
        BenchmarkList::new(entries)
    }

    /// Compiler hints declared with `compiler_control`
    pub fn compiler_hints(&self) -> CompilerHints {
        let hints = self
            .classes
            .iter()
            .flat_map(|class| {
                class.methods.iter().filter_map(move |method| {
                    method.control.map(|directive| CompilerHint {
                        directive,
                        target: class.benchmark_id(method),
                    })
                })
            })
            .collect();
        CompilerHints::new(hints)
    }

    fn harness_root(&self) -> TokenStream {
        let runtime = format_ident!("{}", RUNTIME_MODULE);
        let modules = self.classes.iter().map(|c| format_ident!("{}", c.name));

        let mut wrappers = Vec::new();
        let mut table = Vec::new();
        for (index, (class, method)) in self
            .classes
            .iter()
            .flat_map(|c| c.methods.iter().map(move |m| (c, m)))
            .enumerate()
        {
            let wrapper = format_ident!("__hotbench_{}", index);
            let module = format_ident!("{}", class.name);
            let func = format_ident!("{}", method.name);
            let id = class.benchmark_id(method);

            wrappers.push(quote! {
                fn #wrapper(ops: u64, dont_inline: bool) {
                    if dont_inline {
                        #runtime::measure_opaque(ops, #module::#func);
                    } else {
                        for _ in 0..ops {
                            ::std::hint::black_box(#module::#func());
                        }
                    }
                }
            });
            table.push(quote! {
                #runtime::Benchmark { id: #id, run: #wrapper },
            });
        }

        quote! {
            #![allow(dead_code, unused_imports, non_snake_case)]

            mod #runtime;
            #(mod #modules;)*

            #(#wrappers)*

            static BENCHMARKS: &[#runtime::Benchmark] = &[#(#table)*];

            fn main() {
                ::std::process::exit(#runtime::main(BENCHMARKS));
            }
        }
    }
}

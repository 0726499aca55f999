//! Stylesheet bundling via lightningcss.
//!
//! Every `.css` file outside a partial is parsed, has its local `@import`
//! rules inlined depth-first, and is printed back out. Files whose name
//! starts with `_` are partials: they are claimed so they are never copied,
//! but produce no output of their own.
//!
//! Import resolution:
//! - `http:`, `https:` and protocol-relative `//` URLs are kept and hoisted
//!   to the top of the bundle.
//! - Anything else resolves relative to the importing file. If that file
//!   does not exist, the first configured vendor directory under the project
//!   root is tried (`@import "reset/reset.css"`).
//!
//! Each imported sheet is parsed on its own so parse errors point at the
//! file and line they occur in. Media or supports conditions on inlined
//! imports are not carried over.
//!
//! In an in-place build a stylesheet with no local imports is left as it
//! is when minification is off. One that would change is still refused by
//! the pipeline, since its output would overwrite its source.

use crate::graph::Recorder;
use crate::transform::{ExecutionContext, ProcessError, TransformError, TransformOutput, Transformer};
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Transformer for `*.css` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct StylesheetTransformer;

impl StylesheetTransformer {
    /// Create a stylesheet transformer.
    pub fn new() -> Self {
        Self
    }
}

/// Whether `path` names a partial (`_name.css`).
pub fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http:") || url.starts_with("https:") || url.starts_with("//")
}

impl Transformer for StylesheetTransformer {
    fn name(&self) -> &'static str {
        "stylesheet"
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "css")
    }

    fn process(&self, file: &Path, ctx: &ExecutionContext<'_>) -> Result<TransformOutput, ProcessError> {
        if is_partial(file) {
            return Ok(TransformOutput::none());
        }

        let recorder = ctx.begin_recording();
        let output = ctx
            .output_path(None)
            .ok_or_else(|| ctx.error_at(0, 0, "stylesheet lies outside the source directory"))?;
        let (_, source) = ctx.load(file)?;

        let mut bundler = Bundler {
            ctx,
            recorder,
            chain: vec![],
            seen: HashSet::new(),
            hoisted: vec![],
            sheets: vec![],
        };
        bundler.add(file, &source)?;

        let minify_output = ctx.build().config().build.minify;
        if ctx.build().is_in_place() && bundler.seen.is_empty() && !minify_output {
            // Nothing to inline or minify, the source already is the output
            return Ok(TransformOutput::none());
        }
        let css = bundler.finish();

        let css = if minify_output {
            minify(&css, ctx)?
        } else {
            css
        };

        Ok(TransformOutput::single(output, css))
    }
}

struct Bundler<'c, 'a> {
    ctx: &'c ExecutionContext<'a>,
    recorder: Recorder<'a>,
    /// Import stack for cycle detection
    chain: Vec<PathBuf>,
    /// Files already inlined once
    seen: HashSet<PathBuf>,
    hoisted: Vec<String>,
    sheets: Vec<String>,
}

impl Bundler<'_, '_> {
    fn add(&mut self, file: &Path, source: &str) -> Result<(), TransformError> {
        let filename = self.ctx.build().display_path(file);
        let options =
            ParserOptions { filename: filename.display().to_string(), ..ParserOptions::default() };

        let mut sheet = StyleSheet::parse(source, options).map_err(|e| {
            let (line, col) = e
                .loc
                .as_ref()
                .map(|l| (l.line as usize + 1, l.column as usize))
                .unwrap_or((0, 0));
            TransformError::at(&filename, line, col, e.kind.to_string())
        })?;

        let imports: Vec<(String, usize, usize)> = sheet
            .rules
            .0
            .iter()
            .filter_map(|rule| match rule {
                CssRule::Import(import) => Some((
                    import.url.to_string(),
                    import.loc.line as usize + 1,
                    import.loc.column as usize,
                )),
                _ => None,
            })
            .collect();
        sheet.rules.0.retain(|rule| !matches!(rule, CssRule::Import(_)));

        let printed = sheet
            .to_css(PrinterOptions::default())
            .map_err(|e| TransformError::without_location(&filename, e.to_string()))?;

        self.chain.push(file.to_path_buf());
        for (url, line, col) in imports {
            if is_remote(&url) {
                if !self.hoisted.contains(&url) {
                    self.hoisted.push(url);
                }
                continue;
            }

            let path = self.resolve(file, &url).ok_or_else(|| {
                TransformError::at(&filename, line, col, format!("cannot resolve import '{}'", url))
            })?;

            if self.chain.contains(&path) {
                let message = format!("import cycle through '{}'", url);
                return Err(TransformError::at(&filename, line, col, message));
            }
            if !self.seen.insert(path.clone()) {
                continue;
            }

            let (path, content) = self.ctx.load(&path).map_err(|e| {
                TransformError::at(&filename, line, col, format!("cannot read import '{}': {}", url, e))
            })?;
            self.add(&path, &content)?;
        }
        self.chain.pop();

        self.sheets.push(printed.code);
        Ok(())
    }

    /// Resolve an import URL, recording the local candidate even when it is
    /// missing so the entry rebuilds once it appears.
    fn resolve(&self, file: &Path, url: &str) -> Option<PathBuf> {
        let local = if let Some(rooted) = url.strip_prefix('/') {
            self.ctx.source_root().join(rooted)
        } else {
            self.ctx.context_for_file(file).resolve_path(url)
        };
        self.recorder.record(&local);

        if local.is_file() {
            return Some(local);
        }

        let vendor = self.ctx.build().vendor_dirs().first()?;
        let candidate = self.ctx.project_root().join(vendor).join(url);
        candidate.is_file().then_some(candidate)
    }

    fn finish(self) -> String {
        let mut css = String::new();
        for url in &self.hoisted {
            css.push_str(&format!("@import \"{}\";\n", url));
        }
        css.push_str(&self.sheets.join("\n"));
        css
    }
}

fn minify(css: &str, ctx: &ExecutionContext<'_>) -> Result<String, TransformError> {
    let filename = ctx.relative_path();
    let options =
        ParserOptions { filename: filename.display().to_string(), ..ParserOptions::default() };

    let mut sheet = StyleSheet::parse(css, options)
        .map_err(|e| TransformError::without_location(&filename, e.to_string()))?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| TransformError::without_location(&filename, e.to_string()))?;
    let printed = sheet
        .to_css(PrinterOptions { minify: true, ..PrinterOptions::default() })
        .map_err(|e| TransformError::without_location(&filename, e.to_string()))?;

    Ok(printed.code)
}

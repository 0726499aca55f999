//! Page templates.
//!
//! A `.page` file is text with `{{ ... }}` directives and renders to one or
//! more `.html` files:
//!
//! | Directive          | Effect                                                |
//! |--------------------|-------------------------------------------------------|
//! | `{{> path}}`       | Render another file in place (nested includes work)   |
//! | `{{url path}}`     | Relative URL from the current page to `path`          |
//! | `{{env}}`          | The build environment tag                             |
//! | `{{data path}}`    | Inline a data file verbatim                           |
//! | `{{page path}}`    | Start a new output page authored as if at `path`      |
//!
//! Include and data paths resolve relative to the file containing the
//! directive. Every file read while rendering becomes a dependency of the
//! entry page.
//!
//! # Example
//!
//! ```ignore
//! <html>
//!   {{> partials/head.partial}}
//!   <link rel="stylesheet" href="{{url style.css}}">
//! </html>
//! {{page gallery/one.html}}
//! <img src="{{url img/one.png}}">
//! ```

use crate::transform::{
    ExecutionContext, OutputFile, ProcessError, TransformError, TransformOutput, Transformer,
};
use std::path::{Path, PathBuf};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Transformer for `*.page` templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageTransformer;

impl PageTransformer {
    /// Create a page transformer.
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for PageTransformer {
    fn name(&self) -> &'static str {
        "page"
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "page")
    }

    fn process(&self, file: &Path, ctx: &ExecutionContext<'_>) -> Result<TransformOutput, ProcessError> {
        ctx.begin_recording();

        let output = ctx
            .output_path(Some("html"))
            .ok_or_else(|| ctx.error_at(0, 0, "page lies outside the source directory"))?;
        let (_, source) = ctx.load(file)?;

        let mut renderer = Renderer {
            ctx,
            chain: vec![file.to_path_buf()],
            pages: vec![Page { source: file.to_path_buf(), output, html: String::new() }],
        };
        renderer.render(file, &source)?;

        let mut out = TransformOutput::none();
        for page in renderer.pages {
            out.push(OutputFile::new(page.output, page.html));
        }
        Ok(out)
    }
}

struct Page {
    /// Location the page is authored at, for URL computation
    source: PathBuf,
    output: PathBuf,
    html: String,
}

struct Renderer<'c, 'a> {
    ctx: &'c ExecutionContext<'a>,
    /// Include stack, entry first
    chain: Vec<PathBuf>,
    pages: Vec<Page>,
}

impl Renderer<'_, '_> {
    fn current(&mut self) -> &mut String {
        // pages is seeded with the entry page and only ever grows
        let last = self.pages.len() - 1;
        &mut self.pages[last].html
    }

    fn render(&mut self, file: &Path, source: &str) -> Result<(), TransformError> {
        let mut rest = 0;

        while let Some(found) = source[rest..].find(OPEN) {
            let start = rest + found;
            let text = &source[rest..start];
            self.current().push_str(text);

            let body_start = start + OPEN.len();
            let Some(len) = source[body_start..].find(CLOSE) else {
                return Err(self.error(file, source, start, "unterminated directive"));
            };

            let body = source[body_start..body_start + len].trim();
            self.directive(file, source, start, body)?;
            rest = body_start + len + CLOSE.len();
        }

        let tail = &source[rest..];
        self.current().push_str(tail);
        Ok(())
    }

    fn directive(
        &mut self,
        file: &Path,
        source: &str,
        offset: usize,
        body: &str,
    ) -> Result<(), TransformError> {
        if let Some(target) = body.strip_prefix('>') {
            let target = self.argument(file, source, offset, ">", target)?;
            return self.include(file, source, offset, target);
        }

        let (name, arg) = match body.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (body, ""),
        };

        match name {
            "env" => {
                let env = self.ctx.environment().to_string();
                self.current().push_str(&env);
            }
            "url" => {
                let target = self.argument(file, source, offset, name, arg)?;
                let page = &self.pages[self.pages.len() - 1].source;
                let url = self.ctx.context_for_file(page).url_for(target);
                self.current().push_str(&url);
            }
            "data" => {
                let target = self.argument(file, source, offset, name, arg)?;
                let path = self.ctx.context_for_file(file).resolve_path(target);
                let (_, data) = self.ctx.load(&path).map_err(|e| {
                    self.error(file, source, offset, format!("cannot read data '{}': {}", target, e))
                })?;
                self.current().push_str(&data);
            }
            "page" => {
                let target = self.argument(file, source, offset, name, arg)?;
                let page_source = self.ctx.context_for_file(file).resolve_path(target);
                let output = self
                    .ctx
                    .context_for_file(&page_source)
                    .output_path(Some("html"))
                    .ok_or_else(|| {
                        self.error(
                            file,
                            source,
                            offset,
                            format!("page '{}' lies outside the source directory", target),
                        )
                    })?;
                self.pages.push(Page { source: page_source, output, html: String::new() });
            }
            "" => return Err(self.error(file, source, offset, "empty directive")),
            other => {
                return Err(self.error(file, source, offset, format!("unknown directive '{}'", other)))
            }
        }

        Ok(())
    }

    fn include(
        &mut self,
        file: &Path,
        source: &str,
        offset: usize,
        target: &str,
    ) -> Result<(), TransformError> {
        let path = self.ctx.context_for_file(file).resolve_path(target);

        if self.chain.contains(&path) {
            let cycle = self
                .chain
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| self.ctx.build().display_path(p).display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(self.error(file, source, offset, format!("include cycle: {}", cycle)));
        }

        let (path, content) = self.ctx.load(&path).map_err(|e| {
            self.error(file, source, offset, format!("cannot include '{}': {}", target, e))
        })?;

        self.chain.push(path.clone());
        let rendered = self.render(&path, &content);
        self.chain.pop();
        rendered
    }

    fn argument<'s>(
        &self,
        file: &Path,
        source: &str,
        offset: usize,
        name: &str,
        arg: &'s str,
    ) -> Result<&'s str, TransformError> {
        let arg = arg.trim();
        if arg.is_empty() {
            Err(self.error(file, source, offset, format!("'{}' needs a path", name)))
        } else {
            Ok(arg)
        }
    }

    fn error(&self, file: &Path, source: &str, offset: usize, message: impl Into<String>) -> TransformError {
        let (line, col) = line_col(source, offset);
        TransformError::at(self.ctx.build().display_path(file), line, col, message)
    }
}

/// 1-indexed line and column of a byte offset.
fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = before[line_start..].chars().count() + 1;
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildContext;
    use crate::config::QuireConfig;
    use crate::graph::DependencyIndex;
    use crate::transform::loader::ModuleLoader;
    use crate::transform::{Position, SourceCache};
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        build: BuildContext,
        index: DependencyIndex,
        cache: SourceCache,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("src")).unwrap();
            let build = BuildContext::new(QuireConfig::default(), temp.path().to_path_buf());
            let index = DependencyIndex::new(temp.path(), vec!["node_modules".to_string()]);
            Self { temp, build, index, cache: SourceCache::new() }
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn run(&self, file: &Path) -> Result<TransformOutput, TransformError> {
            let ctx = ExecutionContext::new(&self.build, &self.index, &self.cache, file);
            PageTransformer.process(file, &ctx).map_err(|e| e.into_transform_error(file, "x"))
        }
    }

    fn html(output: &TransformOutput, index: usize) -> String {
        String::from_utf8(output.files[index].contents.clone()).unwrap()
    }

    #[test]
    fn test_matches() {
        assert!(PageTransformer.matches(Path::new("/s/index.page")));
        assert!(!PageTransformer.matches(Path::new("/s/index.html")));
        assert!(!PageTransformer.matches(Path::new("/s/page")));
    }

    #[test]
    fn test_include_records_dependency() {
        let fx = Fixture::new();
        let partial = fx.write("src/shared.partial", "<nav>{{env}}</nav>");
        let page = fx.write("src/A.page", "<body>{{> shared.partial}}</body>");

        let out = fx.run(&page).unwrap();
        assert_eq!(out.files.len(), 1);
        assert_eq!(out.files[0].path, fx.temp.path().join("dist/A.html"));
        assert_eq!(html(&out, 0), "<body><nav>development</nav></body>");

        let affected = fx.index.affected_entries(&partial);
        assert_eq!(affected.into_iter().collect::<Vec<_>>(), vec![page]);
    }

    #[test]
    fn test_nested_includes_resolve_relative_to_includer() {
        let fx = Fixture::new();
        let inner = fx.write("src/partials/inner.partial", "inner");
        fx.write("src/partials/outer.partial", "[{{> inner.partial}}]");
        let page = fx.write("src/index.page", "{{> partials/outer.partial}}");

        let out = fx.run(&page).unwrap();
        assert_eq!(html(&out, 0), "[inner]");
        assert!(fx.index.affected_entries(&inner).contains(&page));
    }

    #[test]
    fn test_include_cycle_reports_directive_location() {
        let fx = Fixture::new();
        fx.write("src/a.partial", "x\n  {{> b.partial}}");
        fx.write("src/b.partial", "{{> a.partial}}");
        let page = fx.write("src/index.page", "{{> a.partial}}");

        let err = fx.run(&page).unwrap_err();
        assert_eq!(err.filename, PathBuf::from("b.partial"));
        assert_eq!(err.position, Position::at(1, 1));
        assert!(err.message.contains("index.page -> a.partial -> b.partial -> a.partial"));
    }

    #[test]
    fn test_unknown_directive_location() {
        let fx = Fixture::new();
        let page = fx.write("src/index.page", "line one\nab {{ bogus x }}");

        let err = fx.run(&page).unwrap_err();
        assert_eq!(err.filename, PathBuf::from("index.page"));
        assert_eq!(err.position, Position::at(2, 4));
        assert_eq!(err.message, "unknown directive 'bogus'");
    }

    #[test]
    fn test_unterminated_directive() {
        let fx = Fixture::new();
        let page = fx.write("src/index.page", "ok {{url style.css");

        let err = fx.run(&page).unwrap_err();
        assert_eq!(err.position, Position::at(1, 4));
        assert_eq!(err.message, "unterminated directive");
    }

    #[test]
    fn test_missing_include_still_tracked() {
        let fx = Fixture::new();
        let page = fx.write("src/index.page", "{{> later.partial}}");

        let err = fx.run(&page).unwrap_err();
        assert!(err.message.starts_with("cannot include 'later.partial'"));
        let later = fx.temp.path().join("src/later.partial");
        assert!(fx.index.affected_entries(&later).contains(&page));
    }

    #[test]
    fn test_url_relative_to_page_depth() {
        let fx = Fixture::new();
        let page = fx.write("src/blog/post.page", "<a href=\"{{url index.html}}\">");

        let out = fx.run(&page).unwrap();
        assert_eq!(html(&out, 0), "<a href=\"../index.html\">");
        assert_eq!(out.files[0].path, fx.temp.path().join("dist/blog/post.html"));
    }

    #[test]
    fn test_data_inlined_and_tracked() {
        let fx = Fixture::new();
        let data = fx.write("data/site.json", "{\"title\":\"Quire\"}");
        let page = fx.write("src/index.page", "<script>{{data ../data/site.json}}</script>");

        let out = fx.run(&page).unwrap();
        assert_eq!(html(&out, 0), "<script>{\"title\":\"Quire\"}</script>");
        assert_eq!(fx.index.dependencies_of(&page), vec![data.clone()]);
        assert!(fx.cache.contains(&data));
    }

    #[test]
    fn test_missing_data_still_tracked() {
        let fx = Fixture::new();
        let page = fx.write("src/index.page", "{{data later.txt}}");

        let err = fx.run(&page).unwrap_err();
        assert!(err.message.contains("cannot read data 'later.txt'"));
        let later = fx.temp.path().join("src/later.txt");
        assert!(fx.index.affected_entries(&later).contains(&page));
    }

    #[test]
    fn test_page_directive_emits_extra_pages() {
        let fx = Fixture::new();
        let page = fx.write(
            "src/gallery.page",
            "<h1>Gallery</h1>{{page gallery/one.html}}<img src=\"{{url one.png}}\">",
        );

        let out = fx.run(&page).unwrap();
        assert_eq!(out.files.len(), 2);
        assert_eq!(html(&out, 0), "<h1>Gallery</h1>");
        assert_eq!(out.files[1].path, fx.temp.path().join("dist/gallery/one.html"));
        assert_eq!(html(&out, 1), "<img src=\"../one.png\">");
    }

    #[test]
    fn test_rerecording_drops_old_includes() {
        let fx = Fixture::new();
        let old = fx.write("src/old.partial", "old");
        fx.write("src/new.partial", "new");
        let page = fx.write("src/index.page", "{{> old.partial}}");
        fx.run(&page).unwrap();
        assert!(fx.index.affected_entries(&old).contains(&page));

        fs::write(&page, "{{> new.partial}}").unwrap();
        fx.cache.forget(&page);
        fx.run(&page).unwrap();
        assert!(fx.index.affected_entries(&old).is_empty());
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col("abc", 0), (1, 1));
        assert_eq!(line_col("abc\ndef", 5), (2, 2));
        assert_eq!(line_col("é{{", 2), (1, 2));
    }
}

//! One package run: scan → extract → resolve → emit → merge navigation.
//!
//! Everything is rendered and validated in memory before the first file is
//! touched, and the navigation document is only patched after every output
//! file is in place.

use crate::config::{Config, OutputMode, PackageConfig};
use crate::error::{EmitError, GenerateError, Result};
use crate::model::DocumentedEntity;
use crate::nav::{self, NavPatch};
use crate::output::{self, PlannedFile};
use crate::parser::{self, merge, types};
use crate::render::{self, escape, mdx, Layout, Links, RenderContext, Renderer};
use crate::report::{Diagnostic, PackageReport, Stage};
use crate::scan::{self, SourceFile};
use crate::slug::{self, Allocator};

/// Knobs that come from the command line rather than the config file.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// `mdx` or `json`.
    pub format: String,
    /// Patch the navigation document after writing.
    pub update_navigation: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            format: "mdx".to_string(),
            update_navigation: true,
        }
    }
}

/// Generate documentation for one package.
///
/// A failure that stops the package (no sources, a write or navigation
/// error) is recorded as an error diagnostic on the returned report, next to
/// whatever was collected before it.
pub fn generate_package(
    config: &Config,
    package: &PackageConfig,
    options: &GenerateOptions,
) -> PackageReport {
    let span = tracing::info_span!("package", name = %package.name);
    let _enter = span.enter();

    let mut report = PackageReport::new(&package.name);
    if let Err(e) = run(config, package, options, &mut report) {
        let stage = failed_stage(&e);
        tracing::error!(%stage, "{}", e);
        report.push(Diagnostic::error(stage, e.to_string()));
    }
    report
}

fn run(
    config: &Config,
    package: &PackageConfig,
    options: &GenerateOptions,
    report: &mut PackageReport,
) -> Result<()> {
    let renderer = render::create_renderer(&options.format)?;

    tracing::debug!(stage = %Stage::Scanning);
    let scanned = scan::scan(package)?;
    report.root_unreadable = scanned.root_unreadable;
    report.extend(scanned.diagnostics);
    if scanned.sources.is_empty() {
        return Err(GenerateError::NoSources {
            package: package.name.clone(),
        });
    }

    tracing::debug!(stage = %Stage::Extracting, files = scanned.sources.len());
    let files = extract_sources(&scanned.sources, package, report);

    tracing::debug!(stage = %Stage::Resolving, files = scanned.declarations.len());
    let index = resolve_types(&scanned.declarations, report);
    let entities = merge::merge(files, &index, package.include_internal);
    report.entities = entities.len();
    if entities.is_empty() {
        report.push(Diagnostic::warning(
            Stage::Resolving,
            "no documented entities found",
        ));
    }

    tracing::debug!(stage = %Stage::Emitting, entities = entities.len());
    let plan = plan_output(config, package, &entities, renderer.as_ref())?;
    let written = output::write_all(&plan.files)?;
    report.files_written = written.written.len();
    report.files_unchanged = written.unchanged.len();

    if options.update_navigation && plan.navigable {
        tracing::debug!(stage = %Stage::UpdatingNavigation);
        let outcome = nav::update(&config.site.navigation_path(), &plan.nav)?;
        report.nav_entries_added = outcome.pages_added;
    } else {
        tracing::debug!("navigation left untouched");
    }

    tracing::debug!(stage = %Stage::Done);
    tracing::info!(
        entities = report.entities,
        written = report.files_written,
        unchanged = report.files_unchanged,
        "package complete"
    );
    Ok(())
}

/// The stage a fatal error stopped the package in.
fn failed_stage(e: &GenerateError) -> Stage {
    match e {
        GenerateError::Pattern { .. } | GenerateError::NoSources { .. } => Stage::Scanning,
        GenerateError::NavigationRead { .. }
        | GenerateError::NavigationParse { .. }
        | GenerateError::NavigationShape { .. } => Stage::UpdatingNavigation,
        _ => Stage::Emitting,
    }
}

fn extract_sources(
    sources: &[SourceFile],
    package: &PackageConfig,
    report: &mut PackageReport,
) -> Vec<Vec<DocumentedEntity>> {
    let mut files = Vec::with_capacity(sources.len());
    for file in sources {
        let content = match std::fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "cannot read source, skipping");
                report.push(
                    Diagnostic::warning(Stage::Extracting, format!("cannot read file: {}", e))
                        .in_file(&file.path),
                );
                continue;
            }
        };
        match parser::parse_file(file, &content, package.include_internal) {
            Ok(extraction) => {
                tracing::trace!(path = %file.relative, entities = extraction.entities.len(), "extracted");
                report.extend(extraction.diagnostics);
                files.push(extraction.entities);
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), "{}", e);
                report.push(Diagnostic::warning(Stage::Extracting, e.to_string()));
            }
        }
    }
    files
}

fn resolve_types(declarations: &[SourceFile], report: &mut PackageReport) -> types::TypeIndex {
    let mut index = types::TypeIndex::default();
    for file in declarations {
        match std::fs::read_to_string(&file.path) {
            Ok(content) => index.extend(types::resolve(&content, &file.relative)),
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "cannot read declarations, skipping");
                report.push(
                    Diagnostic::warning(Stage::Resolving, format!("cannot read file: {}", e))
                        .in_file(&file.path),
                );
            }
        }
    }
    tracing::debug!(symbols = index.len(), "type index built");
    index
}

/// Everything a package run will write, decided before writing any of it.
#[derive(Debug, Default)]
pub struct OutputPlan {
    pub files: Vec<PlannedFile>,
    pub nav: NavPatch,
    /// Whether the output belongs in the site navigation at all.
    pub navigable: bool,
}

/// Lay out, render and validate every file for `entities`.
pub fn plan_output(
    config: &Config,
    package: &PackageConfig,
    entities: &[DocumentedEntity],
    renderer: &dyn Renderer,
) -> Result<OutputPlan> {
    let root = &config.site.root;
    let output = package.output_path();
    let extension = renderer.file_extension();
    let is_mdx = extension == "mdx";
    let import_mode = is_mdx && package.mode == OutputMode::Import;

    let mut slugs = Allocator::new("-");
    if package.index && !import_mode {
        slugs.reserve("index");
    }
    let assigned: Vec<String> = entities
        .iter()
        .map(|e| slugs.claim(slug::page_slug(&e.name)))
        .collect();

    let links = build_links(entities, &assigned, output, import_mode);
    let layout = if import_mode {
        Layout::Fragment
    } else {
        Layout::Page
    };
    let ctx = RenderContext {
        layout,
        language: &package.language,
        source_url: package.source_url.as_deref(),
        links: &links,
    };

    let mut plan = OutputPlan {
        navigable: is_mdx,
        nav: NavPatch {
            group: package.group().to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    // With no entities there is nothing to aggregate or index.
    if import_mode && !entities.is_empty() {
        let fragments = package.fragments_path();
        let mut components = Allocator::new("");
        for reserved in escape::COMPONENTS {
            components.reserve(reserved);
        }
        let mut snippets = Vec::with_capacity(entities.len());
        for (entity, file_slug) in entities.iter().zip(&assigned) {
            let contents = renderer.render_entity(entity, &ctx)?;
            plan.files.push(PlannedFile::new(
                root.join(&fragments).join(format!("{}.{}", file_slug, extension)),
                contents,
            ));
            snippets.push((
                components.claim(slug::component_name(&entity.name)),
                format!("/{}/{}.{}", fragments, file_slug, extension),
            ));
        }
        plan.files.push(PlannedFile::new(
            root.join(format!("{}.{}", output, extension)),
            mdx::import_page(package.title(), &snippets),
        ));
        plan.nav.pages.push(output.to_string());
    } else if !import_mode {
        if package.index && is_mdx && !entities.is_empty() {
            let entries: Vec<mdx::IndexEntry> = entities
                .iter()
                .zip(&assigned)
                .map(|(entity, file_slug)| mdx::IndexEntry {
                    name: entity.name.clone(),
                    kind: entity.kind,
                    href: format!("/{}/{}", output, file_slug),
                    summary: entity.doc.summary(),
                    deprecated: entity.doc.is_deprecated(),
                })
                .collect();
            let page = mdx::index_page(package.title(), &entries, &ctx);
            escape::validate_fragment(&page).map_err(|reason| EmitError::Malformed {
                symbol: format!("{} index", package.name),
                reason,
            })?;
            plan.files.push(PlannedFile::new(
                root.join(output).join(format!("index.{}", extension)),
                page,
            ));
            plan.nav.pages.push(format!("{}/index", output));
        }
        for (entity, file_slug) in entities.iter().zip(&assigned) {
            let contents = renderer.render_entity(entity, &ctx)?;
            plan.files.push(PlannedFile::new(
                root.join(output).join(format!("{}.{}", file_slug, extension)),
                contents,
            ));
            plan.nav.pages.push(format!("{}/{}", output, file_slug));
        }
    }

    if let Some(ref legacy) = package.legacy_prefix {
        let legacy = legacy.trim_end_matches('/');
        for (entity, file_slug) in entities.iter().zip(&assigned) {
            let destination = match links.resolve(&entity.name) {
                Some(href) => href.to_string(),
                None => format!("/{}", output),
            };
            plan.nav
                .redirects
                .push((format!("{}/{}", legacy, file_slug), destination));
        }
    }

    Ok(plan)
}

/// Site URLs for every entity and member, for `{@link}` rewriting.
fn build_links(
    entities: &[DocumentedEntity],
    slugs: &[String],
    output: &str,
    import_mode: bool,
) -> Links {
    let mut links = Links::default();
    for (entity, file_slug) in entities.iter().zip(slugs) {
        let page = if import_mode {
            format!("/{}#{}", output, slug::github_slug(&entity.name))
        } else {
            format!("/{}/{}", output, file_slug)
        };
        let base = page.split('#').next().unwrap_or(&page).to_string();
        for member in &entity.members {
            links.insert(
                entity.member_path(member),
                format!("{}#{}", base, slug::github_slug(&mdx::member_heading(member))),
            );
        }
        links.insert(entity.name.clone(), page);
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::path::Path;

    fn config(mode: &str, index: bool) -> Config {
        let toml = format!(
            r#"
[site]
root = "site"

[[package]]
name = "client"
title = "Client API"
roots = ["src"]
output = "api/client"
mode = "{mode}"
index = {index}
legacy_prefix = "/client"
"#
        );
        Config::from_toml_str(&toml, Path::new("/work"), None).unwrap()
    }

    fn entities() -> Vec<DocumentedEntity> {
        let mut session = DocumentedEntity::new("Session", EntityKind::Class, Location::default());
        session.doc.description = Some("See {@link useSession}.".to_string());
        session.members.push(Member {
            name: "join".to_string(),
            kind: MemberKind::Method,
            is_static: false,
            doc: Doc::default(),
            signature: None,
            location: Location::default(),
        });
        let hook = DocumentedEntity::new("useSession", EntityKind::Hook, Location::default());
        let clash = DocumentedEntity::new("session", EntityKind::Function, Location::default());
        vec![session, hook, clash]
    }

    fn paths(plan: &OutputPlan) -> Vec<String> {
        plan.files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn pages_mode_layout_with_index() {
        let config = config("pages", true);
        let renderer = render::create_renderer("mdx").unwrap();
        let plan =
            plan_output(&config, &config.packages[0], &entities(), renderer.as_ref()).unwrap();
        assert_eq!(
            paths(&plan),
            vec![
                "/work/site/api/client/index.mdx",
                "/work/site/api/client/session.mdx",
                "/work/site/api/client/use-session.mdx",
                "/work/site/api/client/session-2.mdx",
            ]
        );
        assert_eq!(
            plan.nav.pages,
            vec![
                "api/client/index",
                "api/client/session",
                "api/client/use-session",
                "api/client/session-2"
            ]
        );
        assert_eq!(plan.nav.group, "Client API");
        assert_eq!(
            plan.nav.redirects[0],
            ("/client/session".to_string(), "/api/client/session".to_string())
        );
        assert!(plan.files[1]
            .contents
            .contains("See [`useSession`](/api/client/use-session)."));
    }

    #[test]
    fn import_mode_layout() {
        let config = config("import", false);
        let renderer = render::create_renderer("mdx").unwrap();
        let plan =
            plan_output(&config, &config.packages[0], &entities(), renderer.as_ref()).unwrap();
        assert_eq!(
            paths(&plan),
            vec![
                "/work/site/snippets/client/session.mdx",
                "/work/site/snippets/client/use-session.mdx",
                "/work/site/snippets/client/session-2.mdx",
                "/work/site/api/client.mdx",
            ]
        );
        assert_eq!(plan.nav.pages, vec!["api/client"]);
        let page = &plan.files[3].contents;
        assert!(page.contains("import Session from '/snippets/client/session.mdx';"));
        assert!(page.contains("import Session2 from '/snippets/client/session-2.mdx';"));
        assert!(page.contains("<UseSession />"));
        // Snippets link within the aggregating page
        assert!(plan.files[0]
            .contents
            .contains("See [`useSession`](/api/client#usesession)."));
        assert!(plan.files[0].contents.starts_with("## Session\n"));
    }

    #[test]
    fn no_entities_plan_no_files_and_no_pages() {
        for (mode, index) in [("import", false), ("pages", true)] {
            let config = config(mode, index);
            let renderer = render::create_renderer("mdx").unwrap();
            let plan = plan_output(&config, &config.packages[0], &[], renderer.as_ref()).unwrap();
            assert!(plan.files.is_empty(), "{mode}: {:?}", paths(&plan));
            assert!(plan.nav.pages.is_empty(), "{mode}");
            assert!(plan.nav.redirects.is_empty(), "{mode}");
        }
    }

    #[test]
    fn json_format_never_navigates() {
        let config = config("import", true);
        let renderer = render::create_renderer("json").unwrap();
        let plan =
            plan_output(&config, &config.packages[0], &entities(), renderer.as_ref()).unwrap();
        assert!(!plan.navigable);
        assert_eq!(plan.files.len(), 3);
        assert!(paths(&plan)[0].ends_with("api/client/session.json"));
    }

    #[test]
    fn member_links_point_at_headings() {
        let entities = entities();
        let links = build_links(
            &entities,
            &["session".to_string(), "use-session".to_string(), "session-2".to_string()],
            "api/client",
            false,
        );
        assert_eq!(links.resolve("Session#join"), Some("/api/client/session#join"));
        assert_eq!(links.resolve("session"), Some("/api/client/session-2"));
    }
}

//! Session and load pipeline tests.
//!
//! A stub compiler stands in for the framework compiler. Its analysis yields
//! back to the runtime so concurrent loads really interleave at the same
//! suspension points a real compiler has.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::compiler::{
        CompilationProgram, EmitTransformers, EmittedArtifact, FrameworkCompiler,
        TranspileCompiler,
    };
    use crate::config::{CompilerOptions, LoaderOptions, RoutingOptions};
    use crate::error::BuildError;
    use crate::loader::{LoaderKind, LoaderPipeline, LoaderTag, PassthroughTransform};
    use crate::resource::ResourceHost;
    use crate::routes::RoutesModule;
    use crate::unit::{CompilationSession, ProgramVersion};

    // ═══════════════════════════════════════════════════════════════════════════════
    // STUB COMPILER
    // ═══════════════════════════════════════════════════════════════════════════════

    #[derive(Clone, Default)]
    struct StubCompiler {
        programs: Arc<AtomicUsize>,
        /// Analysis fails while any of these is a root.
        broken: Arc<Mutex<HashSet<PathBuf>>>,
        fail_setup: bool,
    }

    impl StubCompiler {
        fn programs_created(&self) -> usize {
            self.programs.load(Ordering::SeqCst)
        }

        fn set_broken(&self, path: &Path, broken: bool) {
            let mut set = self.broken.lock().unwrap();
            if broken {
                set.insert(path.to_path_buf());
            } else {
                set.remove(path);
            }
        }
    }

    struct StubProgram {
        roots: Vec<PathBuf>,
        fails: bool,
    }

    impl FrameworkCompiler for StubCompiler {
        type Program = StubProgram;

        fn create_program(
            &self,
            root_files: &[PathBuf],
            _options: &CompilerOptions,
            _resources: Arc<ResourceHost>,
        ) -> crate::error::Result<StubProgram> {
            if self.fail_setup {
                return Err(BuildError::Setup("no compiler".to_string()));
            }
            self.programs.fetch_add(1, Ordering::SeqCst);
            let broken = self.broken.lock().unwrap();
            Ok(StubProgram {
                roots: root_files.to_vec(),
                fails: root_files.iter().any(|p| broken.contains(p)),
            })
        }
    }

    impl CompilationProgram for StubProgram {
        async fn analyze(&mut self) -> crate::error::Result<()> {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            if self.fails {
                return Err(BuildError::transform("analysis", "broken root"));
            }
            Ok(())
        }

        fn contains_source(&self, path: &Path) -> bool {
            self.roots.iter().any(|p| p == path)
        }

        fn prepare_emit(&self) -> EmitTransformers {
            EmitTransformers::default()
        }

        fn emit(
            &self,
            path: &Path,
            transformers: &EmitTransformers,
        ) -> crate::error::Result<Vec<EmittedArtifact>> {
            let name = path.to_string_lossy().to_string();
            if name.ends_with("types.ts") {
                return Ok(vec![EmittedArtifact {
                    file_name: name.replace(".ts", ".d.ts"),
                    data: "export type Id = string;".to_string(),
                }]);
            }

            let source = if name.ends_with("main.ts") {
                "bootstrapApplication(App);".to_string()
            } else {
                format!("export const roots = {};", self.roots.len())
            };
            let code = transformers.apply_before(path, &source)?;
            Ok(vec![
                EmittedArtifact {
                    file_name: name.replace(".ts", ".js"),
                    data: code,
                },
                EmittedArtifact {
                    file_name: name.replace(".ts", ".js.map"),
                    data: "{}".to_string(),
                },
            ])
        }

        fn dependencies(&self, path: &Path) -> Vec<PathBuf> {
            self.roots.iter().filter(|p| *p != path).cloned().collect()
        }
    }

    async fn stub_session(compiler: StubCompiler) -> CompilationSession<StubCompiler> {
        CompilationSession::start(
            compiler,
            CompilerOptions::default(),
            Arc::new(ResourceHost::disabled()),
        )
        .await
        .unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // UNIT MANAGER
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_setup_creates_one_empty_program() {
        let compiler = StubCompiler::default();
        let session = stub_session(compiler.clone()).await;

        assert_eq!(compiler.programs_created(), 1);
        assert!(session.root_files().await.is_empty());
        assert_eq!(session.version().await, ProgramVersion(0));
        assert_eq!(session.rebuild_count().await, 0);
    }

    #[tokio::test]
    async fn test_setup_failure_is_setup_error() {
        let compiler = StubCompiler {
            fail_setup: true,
            ..Default::default()
        };
        let err = CompilationSession::start(
            compiler,
            CompilerOptions::default(),
            Arc::new(ResourceHost::disabled()),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, BuildError::Setup(_)));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let session = stub_session(StubCompiler::default()).await;
        let a = PathBuf::from("/app/src/a.ts");

        assert!(session.ensure(&a).await.unwrap());
        assert!(!session.ensure(&a).await.unwrap());
        assert!(!session.ensure(&a).await.unwrap());

        assert_eq!(session.rebuild_count().await, 1);
        assert_eq!(session.root_files().await, vec![a]);
    }

    #[tokio::test]
    async fn test_root_set_grows_in_discovery_order() {
        let session = stub_session(StubCompiler::default()).await;
        let files: Vec<PathBuf> = ["/app/c.ts", "/app/a.ts", "/app/b.ts"]
            .iter()
            .map(PathBuf::from)
            .collect();

        for f in &files {
            session.compile(f).await.unwrap();
        }

        assert_eq!(session.root_files().await, files);
        assert_eq!(session.version().await, ProgramVersion(3));
        // Each rebuild sees every file discovered so far.
        let out = session.emit(&files[0]).await.unwrap();
        assert_eq!(out.code, "export const roots = 3;");
        assert_eq!(out.dependencies.len(), 2);
    }

    #[tokio::test]
    async fn test_emit_without_ensure_is_unknown_source() {
        let session = stub_session(StubCompiler::default()).await;
        let err = session.emit(Path::new("/app/x.ts")).await.unwrap_err();
        assert!(matches!(err, BuildError::UnknownSource { .. }));
        assert_eq!(err.to_string(), "Unable to retrieve source file: /app/x.ts");
    }

    #[tokio::test]
    async fn test_emit_keeps_only_javascript_and_hashes_it() {
        let session = stub_session(StubCompiler::default()).await;
        let a = PathBuf::from("/app/a.ts");

        let first = session.compile(&a).await.unwrap();
        assert_eq!(first.code, "export const roots = 1;");
        assert_eq!(first.hash.len(), 64);

        let again = session.emit(&a).await.unwrap();
        assert_eq!(first.hash, again.hash);
    }

    #[tokio::test]
    async fn test_type_only_file_is_emit_failure() {
        let session = stub_session(StubCompiler::default()).await;
        let err = session.compile(Path::new("/app/types.ts")).await.unwrap_err();
        assert!(matches!(err, BuildError::EmitFailure { .. }));
        assert_eq!(err.to_string(), "Failed to emit file: /app/types.ts");
    }

    #[tokio::test]
    async fn test_bootstrap_call_is_wrapped_on_emit() {
        let session = stub_session(StubCompiler::default()).await;
        let out = session.compile(Path::new("/app/src/main.ts")).await.unwrap();
        assert_eq!(
            out.code,
            "Promise.resolve(bootstrapApplication(App)).then((ref) => { window.ngRef = ref; return ref; });"
        );
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_program() {
        let compiler = StubCompiler::default();
        let session = stub_session(compiler.clone()).await;
        let a = PathBuf::from("/app/a.ts");
        let b = PathBuf::from("/app/b.ts");

        session.compile(&a).await.unwrap();
        compiler.set_broken(&b, true);

        assert!(session.compile(&b).await.is_err());
        assert_eq!(session.version().await, ProgramVersion(1));
        // The old program still serves a.
        assert_eq!(session.emit(&a).await.unwrap().code, "export const roots = 1;");
        assert!(matches!(
            session.emit(&b).await.unwrap_err(),
            BuildError::UnknownSource { .. }
        ));

        // Stale: a known path still triggers a rebuild once b is fixed.
        compiler.set_broken(&b, false);
        assert!(session.ensure(&a).await.unwrap());
        assert_eq!(session.version().await, ProgramVersion(2));
        assert_eq!(session.emit(&b).await.unwrap().code, "export const roots = 2;");
        assert!(!session.ensure(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_compile_source_rebuilds_only_on_new_text() {
        let compiler = StubCompiler::default();
        let session = stub_session(compiler.clone()).await;
        let a = PathBuf::from("/app/a.ts");

        session.compile_source(&a, "export const v = 1;").await.unwrap();
        session.compile_source(&a, "export const v = 1;").await.unwrap();
        assert_eq!(session.rebuild_count().await, 1);

        session.compile_source(&a, "export const v = 2;").await.unwrap();
        assert_eq!(session.rebuild_count().await, 2);
        assert_eq!(session.root_files().await, vec![a]);
        assert_eq!(compiler.programs_created(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_compiles_are_serialized() {
        let compiler = StubCompiler::default();
        let session = Arc::new(stub_session(compiler.clone()).await);
        let a = PathBuf::from("/app/a.ts");
        let b = PathBuf::from("/app/b.ts");
        let c = PathBuf::from("/app/c.ts");

        let (ra, rb, rc, ra2) = tokio::join!(
            session.compile(&a),
            session.compile(&b),
            session.compile(&c),
            session.compile(&a),
        );

        for r in [&ra, &rb, &rc, &ra2] {
            assert!(r.is_ok(), "{:?}", r.as_ref().err());
        }
        let roots: HashSet<_> = session.root_files().await.into_iter().collect();
        assert_eq!(roots, [a.clone(), b.clone(), c.clone()].into_iter().collect());
        assert_eq!(session.rebuild_count().await, 3);
        // Setup program plus one per unique file.
        assert_eq!(compiler.programs_created(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_compiles_across_tasks() {
        let session = Arc::new(stub_session(StubCompiler::default()).await);
        let mut handles = Vec::new();
        for i in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                let path = PathBuf::from(format!("/app/f{}.ts", i % 4));
                session.compile(&path).await.map(|r| r.code)
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
        assert_eq!(session.root_files().await.len(), 4);
        assert_eq!(session.rebuild_count().await, 4);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LOAD PIPELINE
    // ═══════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        dir: tempfile::TempDir,
        pipeline: LoaderPipeline<TranspileCompiler>,
    }

    impl Fixture {
        async fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for (name, text) in files {
                let path = dir.path().join(name);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(&path, text).unwrap();
            }

            let options = LoaderOptions {
                inline_styles_extension: None,
                routing: RoutingOptions {
                    redirect_to: Some("/index".to_string()),
                    ..Default::default()
                },
            };
            let pipeline =
                LoaderPipeline::setup(TranspileCompiler, &options, dir.path(), None, None)
                    .await
                    .unwrap();
            Self { dir, pipeline }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn write(&self, name: &str, text: &str) {
            std::fs::write(self.path(name), text).unwrap();
        }
    }

    #[tokio::test]
    async fn test_entry_file_through_framework_pipeline() {
        let fx = Fixture::new(&[(
            "src/main.ts",
            "import { bootstrapApplication } from '@angular/platform-browser';\nimport { App } from './app';\nbootstrapApplication(App);\n",
        )])
        .await;

        let out = fx.pipeline.load(&fx.path("src/main.ts")).await.unwrap().unwrap();
        assert_eq!(out.loader, LoaderTag::Js);
        assert!(out.contents.starts_with("import '@angular/compiler';\n"));
        assert!(out.contents.contains("window.ngRef = ref"));
        assert!(out.contents.contains("window.ngRef && window.ngRef.destroy();"));
        assert_eq!(fx.pipeline.session().rebuild_count().await, 1);
    }

    #[tokio::test]
    async fn test_component_file_gets_update_hook() {
        let fx = Fixture::new(&[(
            "src/app.ts",
            "@Component({ selector: 'app-root', template: '' })\nexport class App {}\n",
        )])
        .await;

        let out = fx.pipeline.load(&fx.path("src/app.ts")).await.unwrap().unwrap();
        assert_eq!(out.loader, LoaderTag::Js);
        assert!(out.contents.contains("module.__hmrUpdate"));
        assert!(!out.contents.contains("ngRef.destroy"));
    }

    #[tokio::test]
    async fn test_generic_pipeline_for_javascript() {
        let fx = Fixture::new(&[("src/util.js", "export const twice = (n) => n * 2;\n")]).await;

        let out = fx.pipeline.load(&fx.path("src/util.js")).await.unwrap().unwrap();
        assert_eq!(out.loader, LoaderTag::Ts);
        assert!(out.contents.contains("twice"));
        assert!(out.contents.contains("import.meta.hot.accept();"));
        assert!(!out.contents.contains("__hmrUpdate"));
        // Generic loads never touch the compiler session.
        assert_eq!(fx.pipeline.session().rebuild_count().await, 0);
    }

    #[tokio::test]
    async fn test_vendored_and_non_script_paths_fall_back() {
        let fx = Fixture::new(&[
            ("node_modules/lib/index.ts", "export const x = 1;\n"),
            ("node_modules/lib/index.js", "export const x = 1;\n"),
            ("src/styles.css", "body {}\n"),
        ])
        .await;

        for name in ["node_modules/lib/index.ts", "node_modules/lib/index.js", "src/styles.css"] {
            let path = fx.path(name);
            assert_eq!(fx.pipeline.dispatch(&path), None, "{}", name);
            assert!(fx.pipeline.load(&path).await.unwrap().is_none(), "{}", name);
        }
        assert!(fx.pipeline.session().root_files().await.is_empty());
    }

    #[tokio::test]
    async fn test_routes_module_takes_priority() {
        let fx = Fixture::new(&[
            ("src/routes.ng.ts", "export const routes = [];\n"),
            ("src/pages/index.ts", "export const routerMeta = {};\n"),
        ])
        .await;

        let routes_file = fx.path("src/routes.ng.ts");
        assert_eq!(fx.pipeline.dispatch(&routes_file), Some(LoaderKind::Routes));

        let out = fx.pipeline.load(&routes_file).await.unwrap().unwrap();
        assert_eq!(out.loader, LoaderTag::Ts);
        assert!(out.contents.contains("import {routerMeta as r0} from './pages/index.ts';"));
        assert!(out.contents.contains("{ path: '', redirectTo: '/index', pathMatch: 'full' },"));
        assert!(fx.pipeline.session().root_files().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_is_scoped_to_one_module() {
        let fx = Fixture::new(&[("src/ok.ts", "export const ok = true;\n")]).await;

        let missing = fx.path("src/missing.ts");
        let err = fx.pipeline.load(&missing).await.unwrap_err();
        assert_eq!(err.path, missing);
        assert!(matches!(err.source, BuildError::Io { .. }));
        assert!(err.to_string().starts_with("[angular-loader] "));

        let ok = fx.pipeline.load(&fx.path("src/ok.ts")).await.unwrap();
        assert!(ok.is_some());
    }

    #[tokio::test]
    async fn test_edited_file_is_recompiled() {
        let fx = Fixture::new(&[("src/a.ts", "export const v = 1;\n")]).await;
        let a = fx.path("src/a.ts");

        let first = fx.pipeline.load(&a).await.unwrap().unwrap();
        assert!(first.contents.contains("v = 1"));
        assert!(!first.contents.contains("__hmrUpdate"));

        fx.write(
            "src/a.ts",
            "@Component({}) export class Changed {} export const v = 2;\n",
        );
        let second = fx.pipeline.load(&a).await.unwrap().unwrap();
        assert!(second.contents.contains("v = 2"), "{}", second.contents);
        assert!(second.contents.contains("Changed"));
        assert!(second.contents.contains("module.__hmrUpdate"));
        assert_eq!(fx.pipeline.session().rebuild_count().await, 2);

        let third = fx.pipeline.load(&a).await.unwrap().unwrap();
        assert_eq!(third, second);
        assert_eq!(fx.pipeline.session().rebuild_count().await, 2);
    }

    #[tokio::test]
    async fn test_component_resources_inlined_on_load() {
        let fx = Fixture::new(&[
            ("src/card.html", "<p>card works</p>"),
            ("src/card.css", ".card { margin: 0; }"),
            (
                "src/card.ts",
                "@Component({ selector: 'app-card', templateUrl: './card.html', styleUrls: ['./card.css'] })\nexport class Card {}\n",
            ),
        ])
        .await;
        let card = fx.path("src/card.ts");

        let out = fx.pipeline.load(&card).await.unwrap().unwrap();
        assert!(out.contents.contains("<p>card works</p>"));
        assert!(out.contents.contains(".card { margin: 0; }"));
        assert!(!out.contents.contains("styleUrls"));

        let emitted = fx.pipeline.session().emit(&card).await.unwrap();
        assert_eq!(
            emitted.dependencies,
            vec![fx.path("src/card.html"), fx.path("src/card.css")]
        );

        // Editing only the template still rebuilds.
        fx.write("src/card.html", "<p>edited</p>");
        let out = fx.pipeline.load(&card).await.unwrap().unwrap();
        assert!(out.contents.contains("<p>edited</p>"));
        assert_eq!(fx.pipeline.session().rebuild_count().await, 2);
    }

    #[tokio::test]
    async fn test_missing_stylesheet_fails_only_its_file() {
        let fx = Fixture::new(&[
            (
                "src/a.ts",
                "@Component({ selector: 'app-a', styleUrl: './a.css' })\nexport class A {}\n",
            ),
            ("src/b.ts", "export const b = 1;\n"),
        ])
        .await;
        let a = fx.path("src/a.ts");

        let err = fx.pipeline.load(&a).await.unwrap_err();
        assert_eq!(err.path, a);
        assert!(matches!(
            err.source,
            BuildError::ResourceNotFound { ref path } if *path == fx.path("src/a.css")
        ));
        assert!(err.to_string().contains("Unable to locate component resource"));

        let b = fx.pipeline.load(&fx.path("src/b.ts")).await.unwrap().unwrap();
        assert!(b.contents.contains("b = 1"));

        // Once the stylesheet exists the same file loads.
        fx.write("src/a.css", ".a { color: red; }");
        let out = fx.pipeline.load(&a).await.unwrap().unwrap();
        assert!(out.contents.contains(".a { color: red; }"));
    }

    #[tokio::test]
    async fn test_type_only_framework_file_fails_to_emit() {
        let fx = Fixture::new(&[("src/model.ts", "export interface User { id: string }\n")]).await;

        let err = fx.pipeline.load(&fx.path("src/model.ts")).await.unwrap_err();
        assert!(matches!(err.source, BuildError::EmitFailure { .. }));
    }

    #[tokio::test]
    async fn test_loads_are_deterministic() {
        let fx = Fixture::new(&[
            ("src/a.ts", "export const a: number = 1;\n"),
            ("src/b.js", "export const b = 2;\n"),
        ])
        .await;

        for name in ["src/a.ts", "src/b.js"] {
            let first = fx.pipeline.load(&fx.path(name)).await.unwrap();
            let second = fx.pipeline.load(&fx.path(name)).await.unwrap();
            assert_eq!(first, second, "{}", name);
        }
    }

    #[tokio::test]
    async fn test_registrations_list_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let session = CompilationSession::start(
            TranspileCompiler,
            CompilerOptions::default(),
            Arc::new(ResourceHost::disabled()),
        )
        .await
        .unwrap();
        let routes = RoutesModule::new(&RoutingOptions::default(), dir.path()).unwrap();
        let pipeline =
            LoaderPipeline::new(Arc::new(session), Some(routes), Arc::new(PassthroughTransform));

        let kinds: Vec<_> = pipeline.registrations().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![LoaderKind::Routes, LoaderKind::Framework, LoaderKind::Generic]
        );
        let regs = pipeline.registrations();
        assert!(regs[0].filter.starts_with("(?i)"));
        assert!(regs[0].filter.ends_with("routes\\.ng\\.ts$"));
        assert_eq!(regs[1].filter, r"\.[cm]?ts$");
    }
}

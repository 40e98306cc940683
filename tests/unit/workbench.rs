use super::*;
use crate::services::analyzer::{StaticAnalyzeError, StaticAnalyzeRequest};
use crate::services::file::resource::{
    Method, ResourceDescriptor, ResourceRequest, ResourceResponse,
};
use crate::services::{FileError, MemoryKvStore};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// 内存中的资源后端：`None` 表示目录，`Some(content)` 表示文件。
/// 同时充当分析后端：含有 `undefined` 的行各报告一个问题
struct FakeFs {
    nodes: Mutex<BTreeMap<String, Option<String>>>,
    fail: AtomicBool,
    analyzer_down: AtomicBool,
}

impl FakeFs {
    fn new(entries: &[(&str, Option<&str>)]) -> Self {
        let nodes = entries
            .iter()
            .map(|(path, content)| (path.to_string(), content.map(str::to_string)))
            .collect();
        Self {
            nodes: Mutex::new(nodes),
            fail: AtomicBool::new(false),
            analyzer_down: AtomicBool::new(false),
        }
    }

    fn content(&self, path: &str) -> Option<Option<String>> {
        self.nodes.lock().unwrap().get(path).cloned()
    }

    fn describe(nodes: &BTreeMap<String, Option<String>>, path: &str) -> ResourceDescriptor {
        let is_dir = matches!(nodes.get(path), Some(None));
        ResourceDescriptor {
            resource_name: paths::file_name(path).to_string(),
            resource_type: if is_dir { "dir".into() } else { String::new() },
            path: path.to_string(),
            have_children_nodes: is_dir
                && nodes.keys().any(|k| paths::parent(k) == Some(path)),
        }
    }
}

impl ResourceBackend for FakeFs {
    fn request(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FileError::Rejected("backend offline".into()));
        }
        let mut nodes = self.nodes.lock().unwrap();
        let path = request.url.path.clone();
        let listed: Vec<String> = match (request.method, request.query_value("op")) {
            (Method::Get, Some("list")) => nodes
                .keys()
                .filter(|k| paths::parent(k) == Some(path.as_str()))
                .cloned()
                .collect(),
            (Method::Post, Some("rename")) => {
                let new_name = request.query_value("newname").unwrap_or_default();
                let parent = paths::parent(&path).unwrap_or_default().to_string();
                let new_path = paths::join(&parent, new_name);
                let moved: Vec<String> = nodes
                    .keys()
                    .filter(|k| paths::is_within(k, &path))
                    .cloned()
                    .collect();
                for old in moved {
                    let value = nodes.remove(&old).unwrap();
                    let key = paths::replace_prefix(&old, &path, &new_path).unwrap();
                    nodes.insert(key, value);
                }
                vec![new_path]
            }
            (Method::Post, Some("content")) => {
                let body = request.body.clone().unwrap_or_default();
                nodes.insert(path.clone(), Some(String::from_utf8(body).unwrap()));
                vec![path]
            }
            (Method::Put, _) => {
                let body = request.body.clone().unwrap_or_default();
                let value = match request.query_value("type") {
                    Some("dir") => None,
                    _ => Some(String::from_utf8(body).unwrap()),
                };
                nodes.insert(path.clone(), value);
                vec![path]
            }
            (Method::Delete, _) => {
                nodes.retain(|k, _| !paths::is_within(k, &path));
                Vec::new()
            }
            _ => return Err(FileError::Rejected("unsupported".into())),
        };
        Ok(ResourceResponse {
            resources: listed.iter().map(|p| Self::describe(&nodes, p)).collect(),
        })
    }

    fn read_content(&self, path: &str) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FileError::Rejected("backend offline".into()));
        }
        match self.nodes.lock().unwrap().get(path) {
            Some(Some(content)) => Ok(content.clone()),
            _ => Err(FileError::Rejected(format!("not a file: {path}"))),
        }
    }
}

impl AnalyzerBackend for FakeFs {
    fn static_analyze(&self, request: &StaticAnalyzeRequest) -> Result<Vec<StaticAnalyzeError>> {
        if self.analyzer_down.load(Ordering::SeqCst) {
            return Err(FileError::Unavailable("analyzer".into()));
        }
        let code = String::from_utf8_lossy(&request.code);
        Ok(code
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains("undefined"))
            .map(|(idx, line)| StaticAnalyzeError {
                message: "undefined variable".into(),
                severity: "error".into(),
                start_line_number: idx as u32 + 1,
                start_column: 1,
                end_line_number: idx as u32 + 1,
                end_column: line.len() as u32 + 1,
            })
            .collect())
    }
}

type Bench<'a> = Workbench<&'a FakeFs, MemoryKvStore, &'a FakeFs>;

fn sample_fs() -> FakeFs {
    FakeFs::new(&[
        ("/w", None),
        ("/w/lib", None),
        ("/w/lib/a.yak", Some("a")),
        ("/w/lib/b.yak", Some("b")),
        ("/w/main.yak", Some("main")),
    ])
}

fn workbench(fs: &FakeFs) -> Bench<'_> {
    let mut workbench =
        Workbench::new(fs, MemoryKvStore::new(), LayoutConfig::default()).with_analyzer(fs);
    workbench.open_folder("/w").unwrap();
    workbench
}

fn open(workbench: &mut Bench<'_>, path: &str) {
    let code = path.to_string();
    workbench.open_file(FileDescriptor::new(path).with_code(code));
}

fn open_paths(workbench: &Bench<'_>) -> Vec<String> {
    workbench
        .layout()
        .groups()
        .flat_map(|g| g.paths())
        .map(str::to_string)
        .collect()
}

#[test]
fn open_folder_builds_tree_and_history() {
    let fs = sample_fs();
    let workbench = workbench(&fs);

    let names: Vec<_> = workbench
        .tree()
        .flatten_for_view()
        .into_iter()
        .map(|row| row.name.to_string())
        .collect();
    assert_eq!(names, vec!["lib", "main.yak"]);
    assert_eq!(workbench.root(), Some("/w"));

    let history = workbench.history();
    assert_eq!(history[0].path, "/w");
    assert!(!history[0].is_file);
}

#[test]
fn open_folder_failure_keeps_state() {
    let fs = sample_fs();
    fs.fail.store(true, Ordering::SeqCst);
    let mut workbench = Workbench::new(&fs, MemoryKvStore::new(), LayoutConfig::default());

    assert!(workbench.open_folder("/w").is_err());
    assert!(workbench.root().is_none());
    assert!(workbench.history().is_empty());
}

#[test]
fn expand_dir_loads_children() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    workbench.expand_dir("/w/lib").unwrap();

    let lib = workbench.tree().find_node_by_path("/w/lib").unwrap();
    assert!(workbench.tree().is_expanded(lib));
    assert_eq!(workbench.tree().children(lib).count(), 2);
    assert_eq!(workbench.tree().load_state(lib), Some(LoadState::Loaded));
}

#[test]
fn expand_dir_failure_resets_load_state() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    fs.fail.store(true, Ordering::SeqCst);

    assert!(workbench.expand_dir("/w/lib").is_err());
    let lib = workbench.tree().find_node_by_path("/w/lib").unwrap();
    assert_eq!(workbench.tree().load_state(lib), Some(LoadState::NotLoaded));
}

#[test]
fn open_files_insert_after_shown() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/main.yak");
    open(&mut workbench, "/w/lib/a.yak");
    workbench.activate("/w/main.yak");
    open(&mut workbench, "/w/lib/b.yak");

    assert_eq!(
        open_paths(&workbench),
        vec!["/w/main.yak", "/w/lib/b.yak", "/w/lib/a.yak"]
    );
    let shown = workbench.shown().unwrap();
    assert_eq!(shown.path, "/w/lib/b.yak");
    assert_eq!(shown.language, "yak");
    assert_eq!(workbench.history()[0].path, "/w/lib/b.yak");
}

#[test]
fn close_shown_file_shows_left_neighbour() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/main.yak");
    open(&mut workbench, "/w/lib/a.yak");

    let closed = workbench.close_file("/w/lib/a.yak").unwrap();

    assert_eq!(closed.path, "/w/lib/a.yak");
    assert_eq!(workbench.shown().unwrap().path, "/w/main.yak");
    assert!(workbench.shown().unwrap().is_active);
}

#[test]
fn close_all_files_clears_shown() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/main.yak");
    open(&mut workbench, "/w/lib/a.yak");

    let closed = workbench.close_files(["/w/main.yak", "/w/lib/a.yak"]);

    assert_eq!(closed.len(), 2);
    assert!(workbench.layout().is_empty());
    assert!(workbench.shown().is_none());
}

#[test]
fn save_file_writes_content_and_clears_dirty() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/main.yak");
    workbench.update_file(
        "/w/main.yak",
        FilePatch {
            code: Some("yakit.Info(2)".into()),
            is_dirty: Some(true),
            ..FilePatch::default()
        },
    );
    assert!(workbench.shown().unwrap().is_dirty);

    workbench.save_file("/w/main.yak").unwrap();

    assert_eq!(fs.content("/w/main.yak"), Some(Some("yakit.Info(2)".into())));
    assert!(!workbench.shown().unwrap().is_dirty);
}

#[test]
fn save_failure_keeps_dirty_flag() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/main.yak");
    workbench.update_file(
        "/w/main.yak",
        FilePatch {
            is_dirty: Some(true),
            ..FilePatch::default()
        },
    );
    fs.fail.store(true, Ordering::SeqCst);

    assert!(workbench.save_file("/w/main.yak").is_err());
    assert!(workbench.layout().find_file("/w/main.yak").unwrap().is_dirty);
}

#[test]
fn rename_folder_rewrites_open_descendants() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/lib/a.yak");
    open(&mut workbench, "/w/main.yak");
    open(&mut workbench, "/w/lib/b.yak");

    let new_path = workbench.rename_entry("/w/lib", "core").unwrap();

    assert_eq!(new_path, "/w/core");
    assert_eq!(
        open_paths(&workbench),
        vec!["/w/core/a.yak", "/w/main.yak", "/w/core/b.yak"]
    );
    let shown = workbench.shown().unwrap();
    assert_eq!(shown.path, "/w/core/b.yak");
    assert_eq!(shown.parent.as_deref(), Some("/w/core"));
    assert!(workbench.tree().find_node_by_path("/w/core").is_some());
    assert!(fs.content("/w/core/a.yak").is_some());
}

#[test]
fn rename_failure_leaves_layout_untouched() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/lib/a.yak");
    let before = workbench.layout().snapshot();
    fs.fail.store(true, Ordering::SeqCst);

    assert!(workbench.rename_entry("/w/lib", "core").is_err());
    assert_eq!(workbench.layout().snapshot(), before);
    assert!(workbench.tree().find_node_by_path("/w/lib").is_some());
}

#[test]
fn delete_folder_closes_open_files_inside() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/main.yak");
    open(&mut workbench, "/w/lib/a.yak");
    open(&mut workbench, "/w/lib/b.yak");

    let closed = workbench.delete_entry("/w/lib").unwrap();

    assert_eq!(closed.len(), 2);
    assert_eq!(open_paths(&workbench), vec!["/w/main.yak"]);
    assert_eq!(workbench.shown().unwrap().path, "/w/main.yak");
    assert!(workbench.tree().find_node_by_path("/w/lib").is_none());
    assert_eq!(fs.content("/w/lib/a.yak"), None);
}

#[test]
fn create_file_opens_it_and_refreshes_tree() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);

    let created = workbench
        .create_file("/w", "new.yak", Some("println(1)"))
        .unwrap()
        .clone();

    assert_eq!(created.path, "/w/new.yak");
    assert_eq!(created.code, "println(1)");
    assert_eq!(fs.content("/w/new.yak"), Some(Some("println(1)".into())));
    assert!(workbench.tree().find_node_by_path("/w/new.yak").is_some());
    assert_eq!(workbench.shown().unwrap().path, "/w/new.yak");
}

#[test]
fn create_dir_in_loaded_folder_refreshes_children() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    workbench.expand_dir("/w/lib").unwrap();

    let path = workbench.create_dir("/w/lib", "sub").unwrap();

    assert_eq!(path, "/w/lib/sub");
    let lib = workbench.tree().find_node_by_path("/w/lib").unwrap();
    assert_eq!(workbench.tree().children(lib).count(), 3);
    let first = workbench.tree().children(lib).next().unwrap();
    assert!(workbench.tree().is_dir(first));
}

#[test]
fn rename_onto_open_path_keeps_shown_file() {
    let fs = FakeFs::new(&[
        ("/w", None),
        ("/w/a", None),
        ("/w/a/x.yak", Some("a")),
        ("/w/b", None),
        ("/w/b/x.yak", Some("b")),
    ]);
    let mut workbench = workbench(&fs);
    open(&mut workbench, "/w/b/x.yak");
    open(&mut workbench, "/w/a/x.yak");

    workbench.rename_entry("/w/a", "b").unwrap();

    assert_eq!(open_paths(&workbench), vec!["/w/b/x.yak", "/w/a/x.yak"]);
    let shown = workbench.shown().unwrap();
    assert_eq!(shown.path, "/w/a/x.yak");
    let active: Vec<_> = workbench
        .layout()
        .active_files()
        .iter()
        .map(|f| f.path.clone())
        .collect();
    assert_eq!(active, vec![shown.path.clone()]);
}

#[test]
fn create_in_root_keeps_expanded_folders() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    workbench.expand_dir("/w/lib").unwrap();

    workbench.create_file("/w", "n.yak", None).unwrap();

    let lib = workbench.tree().find_node_by_path("/w/lib").unwrap();
    assert!(workbench.tree().is_expanded(lib));
    assert_eq!(workbench.tree().children(lib).count(), 2);
    let names: Vec<_> = workbench
        .tree()
        .flatten_for_view()
        .into_iter()
        .map(|row| row.name.to_string())
        .collect();
    assert_eq!(names, vec!["lib", "a.yak", "b.yak", "main.yak", "n.yak"]);
}

#[test]
fn open_path_reads_content_and_checks_syntax() {
    let fs = FakeFs::new(&[
        ("/w", None),
        ("/w/main.yak", Some("a = 1\nprintln(undefined)")),
    ]);
    let mut workbench = workbench(&fs);

    let file = workbench.open_path("/w/main.yak").unwrap().clone();

    assert_eq!(file.code, "a = 1\nprintln(undefined)");
    assert_eq!(file.language, "yak");
    let markers = &file.extra[SYNTAX_CHECK_KEY];
    assert_eq!(markers.as_array().map(Vec::len), Some(1));
    assert_eq!(markers[0]["startLineNumber"], json!(2));
    assert_eq!(markers[0]["severity"], json!(8));
    assert_eq!(workbench.shown(), Some(&file));
    assert_eq!(workbench.history()[0].path, "/w/main.yak");
}

#[test]
fn open_path_with_failing_analyzer_gets_empty_markers() {
    let fs = sample_fs();
    fs.analyzer_down.store(true, Ordering::SeqCst);
    let mut workbench = workbench(&fs);

    let file = workbench.open_path("/w/main.yak").unwrap();

    assert_eq!(file.code, "main");
    assert_eq!(file.extra[SYNTAX_CHECK_KEY], json!([]));
}

#[test]
fn open_path_skips_syntax_check_for_other_languages() {
    let fs = FakeFs::new(&[("/w", None), ("/w/conf.json", Some("{\"undefined\": 1}"))]);
    let mut workbench = workbench(&fs);

    let file = workbench.open_path("/w/conf.json").unwrap();

    assert_eq!(file.language, "json");
    assert!(!file.extra.contains_key(SYNTAX_CHECK_KEY));
}

#[test]
fn open_path_read_failure_leaves_layout_empty() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);

    assert!(workbench.open_path("/w/missing.yak").is_err());
    assert!(workbench.open_path("/w/lib").is_err());
    assert!(workbench.layout().is_empty());
    assert!(workbench.shown().is_none());
}

#[test]
fn open_path_already_open_does_not_read_again() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    workbench.open_path("/w/main.yak").unwrap();
    open(&mut workbench, "/w/lib/a.yak");
    fs.fail.store(true, Ordering::SeqCst);

    let file = workbench.open_path("/w/main.yak").unwrap();

    assert_eq!(file.path, "/w/main.yak");
    assert!(file.is_active);
    assert_eq!(workbench.layout().len(), 2);
}

#[test]
fn check_syntax_refreshes_markers() {
    let fs = sample_fs();
    let mut workbench = workbench(&fs);
    workbench.open_path("/w/main.yak").unwrap();
    assert_eq!(workbench.shown().unwrap().extra[SYNTAX_CHECK_KEY], json!([]));

    workbench.update_file("/w/main.yak", FilePatch::code("undefined()"));
    assert!(workbench.check_syntax("/w/main.yak"));

    let markers = &workbench.shown().unwrap().extra[SYNTAX_CHECK_KEY];
    assert_eq!(markers.as_array().map(Vec::len), Some(1));
    assert!(!workbench.check_syntax("/w/lib/a.yak"));
}

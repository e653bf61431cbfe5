//! End-to-end mirror runs over real repositories
//!
//! Standard histories are built through `GitRepo` itself; every run opens
//! fresh handles the way the CLI does.

use std::fs;
use std::path::{Path, PathBuf};

use libgitmirror_core::marker;
use libgitmirror_core::{
    AllowList, Backend, CommitRequest, Mirror, MirrorError, MirrorOptions, RunReport, Signature,
};
use libgitmirror_git::GitRepo;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    standard_path: PathBuf,
    mirror_path: PathBuf,
    standard: GitRepo,
    tick: i64,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let standard_path = dir.path().join("standard");
        let mirror_path = dir.path().join("mirror");
        let standard = init_repo(&standard_path);
        init_repo(&mirror_path);
        Self {
            _dir: dir,
            standard_path,
            mirror_path,
            standard,
            tick: 0,
        }
    }

    /// Write (`Some`) or delete (`None`) files, then commit on the current branch
    fn commit(&mut self, changes: &[(&str, Option<&str>)], message: &str) -> String {
        for (path, content) in changes {
            let full = self.standard_path.join(path);
            match content {
                Some(text) => {
                    fs::create_dir_all(full.parent().unwrap()).unwrap();
                    fs::write(&full, text).unwrap();
                }
                None => fs::remove_file(&full).unwrap(),
            }
        }
        self.commit_worktree(message)
    }

    fn commit_worktree(&mut self, message: &str) -> String {
        self.tick += 1;
        let sig = Signature {
            name: "Standard Dev".to_string(),
            email: "dev@example.com".to_string(),
            time: 1_700_000_000 + self.tick * 60,
            offset_minutes: 0,
        };
        let request = CommitRequest {
            author: sig.clone(),
            committer: sig,
            message: message.to_string(),
        };
        self.standard.commit_worktree(&request).unwrap().unwrap()
    }

    fn options(&self, folders: &[&str]) -> MirrorOptions {
        MirrorOptions {
            allow: AllowList::new(folders.iter().copied(), std::iter::empty::<&str>()),
            standard_depth: 1000,
            mirror_depth: 1000,
            standard_ref: "HEAD".to_string(),
            default_branch: "main".to_string(),
            remote: None,
        }
    }

    fn run(&self, root: &str, options: MirrorOptions) -> Result<RunReport, MirrorError> {
        let standard = GitRepo::open(&self.standard_path).unwrap();
        let mirror = GitRepo::open(&self.mirror_path).unwrap();
        Mirror::new(standard, mirror, options).mirror(root)
    }

    fn mirror(&self) -> GitRepo {
        GitRepo::open(&self.mirror_path).unwrap()
    }
}

fn init_repo(path: &Path) -> GitRepo {
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = git2::Repository::init_opts(path, &opts).unwrap();
    GitRepo::from_repository(repo).unwrap()
}

fn branch_tip(repo: &GitRepo, name: &str) -> String {
    repo.branches()
        .unwrap()
        .into_iter()
        .find(|b| b.name == name)
        .map(|b| b.tip)
        .unwrap()
}

fn branch_names(repo: &GitRepo) -> Vec<String> {
    repo.branches().unwrap().into_iter().map(|b| b.name).collect()
}

#[test]
fn test_only_in_scope_commits_are_mirrored() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("README.md", Some("hello\n"))], "Add readme");
    let b = fx.commit(&[("lib/core.txt", Some("core v1\n"))], "Add core");
    fx.commit(&[("docs/guide.md", Some("guide\n"))], "Add guide");

    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.commits_created, 1);
    assert_eq!(report.merges_created, 0);
    assert_eq!(report.skipped, 2);

    let mirror = fx.mirror();
    assert_eq!(branch_names(&mirror), vec!["main".to_string()]);
    let tip = branch_tip(&mirror, "main");
    assert_eq!(report.mirror_tip.as_deref(), Some(tip.as_str()));

    let info = mirror.commit(&tip).unwrap();
    assert!(info.parents.is_empty());
    assert_eq!(marker::extract(&info.message), Some(b.clone()));
    assert!(info.message.starts_with("Add core"));
    assert_eq!(info.author.email, "dev@example.com");

    assert_eq!(
        mirror.read_file(&tip, "lib/core.txt").unwrap(),
        Some(b"core v1\n".to_vec())
    );
    assert_eq!(mirror.read_file(&tip, "README.md").unwrap(), None);
    assert!(!fx.mirror_path.join("docs").exists());
}

#[test]
fn test_root_snapshot_keeps_only_allowed_files() {
    let mut fx = Fixture::new();
    let a = fx.commit(
        &[
            ("lib/a.txt", Some("a\n")),
            ("secret/key.txt", Some("nope\n")),
            ("VERSION", Some("1\n")),
        ],
        "Initial import",
    );

    let mut options = fx.options(&["lib"]);
    options.allow = AllowList::new(["lib"], ["VERSION"]);
    let report = fx.run(&a, options).unwrap();
    assert_eq!(report.commits_created, 1);

    let mirror = fx.mirror();
    let tip = branch_tip(&mirror, "main");
    assert_eq!(mirror.read_file(&tip, "lib/a.txt").unwrap(), Some(b"a\n".to_vec()));
    assert_eq!(mirror.read_file(&tip, "VERSION").unwrap(), Some(b"1\n".to_vec()));
    assert_eq!(mirror.read_file(&tip, "secret/key.txt").unwrap(), None);
}

#[test]
fn test_second_run_is_idempotent() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a1\n"))], "First");
    fx.commit(&[("lib/a.txt", Some("a2\n"))], "Second");

    let first = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(first.commits_created, 2);
    let tip = branch_tip(&fx.mirror(), "main");

    let second = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(second.commits_created, 0);
    assert_eq!(second.merges_created, 0);
    assert!(second.resumed_from.is_some());
    assert_eq!(branch_tip(&fx.mirror(), "main"), tip);
}

#[test]
fn test_incremental_run_appends_new_commits() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a1\n"))], "First");
    let b = fx.commit(&[("lib/a.txt", Some("a2\n"))], "Second");
    fx.run(&a, fx.options(&["lib"])).unwrap();
    let before = branch_tip(&fx.mirror(), "main");

    let c = fx.commit(
        &[("lib/b.txt", Some("b\n")), ("tools/x.sh", Some("echo\n"))],
        "Third",
    );
    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.resumed_from.as_deref(), Some(b.as_str()));
    assert_eq!(report.commits_created, 1);

    let mirror = fx.mirror();
    let tip = branch_tip(&mirror, "main");
    let info = mirror.commit(&tip).unwrap();
    assert_eq!(info.parents, vec![before]);
    assert_eq!(marker::extract(&info.message), Some(c));
    assert_eq!(mirror.read_file(&tip, "lib/b.txt").unwrap(), Some(b"b\n".to_vec()));
    assert_eq!(mirror.read_file(&tip, "tools/x.sh").unwrap(), None);
}

#[test]
fn test_merge_conflict_takes_standard_content() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/f.txt", Some("base\n"))], "Base");
    fx.commit(&[("lib/f.txt", Some("main side\n"))], "Main change");

    fx.standard.create_branch("feature", &a).unwrap();
    fx.standard.checkout_branch("feature").unwrap();
    fx.commit(&[("lib/f.txt", Some("feature side\n"))], "Feature change");

    fx.standard.checkout_branch("main").unwrap();
    fx.standard.merge_branch("feature").unwrap();
    fs::write(fx.standard_path.join("lib/f.txt"), "resolved\n").unwrap();
    let m = fx.commit_worktree("Merge branch 'feature'");

    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.commits_created, 3);
    assert_eq!(report.merges_created, 1);

    let mirror = fx.mirror();
    let tip = branch_tip(&mirror, "main");
    let info = mirror.commit(&tip).unwrap();
    assert_eq!(info.parents.len(), 2);
    assert_eq!(marker::extract(&info.message), Some(m));
    assert_eq!(
        mirror.read_file(&tip, "lib/f.txt").unwrap(),
        Some(b"resolved\n".to_vec())
    );

    // The side lineage keeps its own marker
    let side = mirror.commit(&info.parents[1]).unwrap();
    assert!(side.message.starts_with("Feature change"));

    // Scratch lineage branches do not survive reconciliation
    assert_eq!(branch_names(&mirror), vec!["main".to_string()]);
    assert_eq!(report.pruned, vec!["feature".to_string()]);
    assert_eq!(mirror.head_branch().unwrap(), Some("main".to_string()));
}

#[test]
fn test_side_lineage_without_mirror_parent_starts_empty() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("README.md", Some("hello\n"))], "Add readme");
    fx.commit(&[("lib/b.txt", Some("b\n"))], "Add b");

    fx.standard.create_branch("feature", &a).unwrap();
    fx.standard.checkout_branch("feature").unwrap();
    let f = fx.commit(&[("lib/f.txt", Some("f\n"))], "Add f");

    fx.standard.checkout_branch("main").unwrap();
    fx.standard.merge_branch("feature").unwrap();
    fx.commit_worktree("Merge branch 'feature'");

    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.commits_created, 3);
    assert_eq!(report.merges_created, 1);

    let mirror = fx.mirror();
    let tip = branch_tip(&mirror, "main");
    let merge = mirror.commit(&tip).unwrap();
    assert_eq!(merge.parents.len(), 2);
    assert_eq!(mirror.read_file(&tip, "lib/b.txt").unwrap(), Some(b"b\n".to_vec()));
    assert_eq!(mirror.read_file(&tip, "lib/f.txt").unwrap(), Some(b"f\n".to_vec()));

    // The feature lineage has no in-scope ancestor, so it must not fork from main
    let side = mirror.commit(&merge.parents[1]).unwrap();
    assert_eq!(marker::extract(&side.message), Some(f));
    assert!(side.parents.is_empty());
    assert_eq!(mirror.read_file(&side.hash, "lib/b.txt").unwrap(), None);
}

#[test]
fn test_merge_of_lineage_before_root_is_skipped() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a\n"))], "Add a");

    fx.standard.create_branch("feature", &a).unwrap();
    fx.standard.checkout_branch("feature").unwrap();
    fx.commit(&[("lib/f.txt", Some("f\n"))], "Add f");

    fx.standard.checkout_branch("main").unwrap();
    let b = fx.commit(&[("lib/b.txt", Some("b\n"))], "Add b");
    fx.standard.merge_branch("feature").unwrap();
    fx.commit_worktree("Merge branch 'feature'");

    // Rooting at b cuts the feature lineage off from the replayed window
    let report = fx.run(&b, fx.options(&["lib"])).unwrap();
    assert_eq!(report.commits_created, 1);
    assert_eq!(report.merges_created, 0);
    assert_eq!(report.skipped, 1);

    let mirror = fx.mirror();
    let tip = branch_tip(&mirror, "main");
    let info = mirror.commit(&tip).unwrap();
    assert_eq!(marker::extract(&info.message), Some(b));
    assert_eq!(mirror.read_file(&tip, "lib/a.txt").unwrap(), Some(b"a\n".to_vec()));
    assert_eq!(mirror.read_file(&tip, "lib/f.txt").unwrap(), None);
    assert_eq!(branch_names(&mirror), vec!["main".to_string()]);
}

#[test]
fn test_every_branch_holding_final_commit_is_mirrored() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a\n"))], "Add a");
    let b = fx.commit(&[("lib/b.txt", Some("b\n"))], "Add b");
    fx.standard.create_branch("release", &b).unwrap();

    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.branches, vec!["main".to_string(), "release".to_string()]);

    let mirror = fx.mirror();
    assert_eq!(branch_names(&mirror), vec!["main".to_string(), "release".to_string()]);
    assert_eq!(branch_tip(&mirror, "main"), branch_tip(&mirror, "release"));
    assert_eq!(report.mirror_tip, Some(branch_tip(&mirror, "main")));
    assert_eq!(mirror.head_branch().unwrap(), Some("main".to_string()));
}

#[test]
fn test_deleted_side_branch_scratch_branch_is_pruned() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a\n"))], "Add a");

    fx.standard.create_branch("work", &a).unwrap();
    fx.standard.checkout_branch("work").unwrap();
    let f = fx.commit(&[("lib/f.txt", Some("f\n"))], "Add f");

    fx.standard.checkout_branch("main").unwrap();
    fx.commit(&[("lib/b.txt", Some("b\n"))], "Add b");
    fx.standard.merge_branch("work").unwrap();
    fx.commit_worktree("Merge work");
    fx.standard.delete_branch("work").unwrap();

    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.merges_created, 1);
    assert_eq!(report.pruned, vec![format!("merged/{}", &f[..10])]);

    let mirror = fx.mirror();
    assert_eq!(branch_names(&mirror), vec!["main".to_string()]);
    let tip = branch_tip(&mirror, "main");
    assert_eq!(mirror.read_file(&tip, "lib/f.txt").unwrap(), Some(b"f\n".to_vec()));
}

#[test]
fn test_rename_out_of_scope_removes_old_path() {
    let mut fx = Fixture::new();
    let content = "a fairly long file body\nso rename detection has\nsomething to compare\n";
    let a = fx.commit(&[("lib/moving.txt", Some(content))], "Add file");
    fx.commit(
        &[("lib/moving.txt", None), ("attic/moving.txt", Some(content))],
        "Move file out",
    );

    let report = fx.run(&a, fx.options(&["lib"])).unwrap();
    assert_eq!(report.commits_created, 2);

    let mirror = fx.mirror();
    let tip = branch_tip(&mirror, "main");
    assert_eq!(mirror.read_file(&tip, "lib/moving.txt").unwrap(), None);
    assert_eq!(mirror.read_file(&tip, "attic/moving.txt").unwrap(), None);
    assert!(!fx.mirror_path.join("lib").exists());
}

#[test]
fn test_root_outside_history_fails() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a\n"))], "First");
    fx.standard.create_branch("other", &a).unwrap();
    fx.standard.checkout_branch("other").unwrap();
    let unrelated = fx.commit(&[("lib/o.txt", Some("o\n"))], "Elsewhere");
    fx.standard.checkout_branch("main").unwrap();

    let err = fx.run(&unrelated, fx.options(&["lib"])).unwrap_err();
    assert!(matches!(err, MirrorError::RootCommitNotFound { .. }));
    assert!(fx.mirror().head().unwrap().is_none());
}

#[test]
fn test_unknown_root_fails() {
    let mut fx = Fixture::new();
    fx.commit(&[("lib/a.txt", Some("a\n"))], "First");

    let err = fx
        .run("0123456789abcdef0123456789abcdef01234567", fx.options(&["lib"]))
        .unwrap_err();
    assert!(matches!(err, MirrorError::CommitNotFound(_)));
}

#[test]
fn test_push_updates_remote() {
    let mut fx = Fixture::new();
    let a = fx.commit(&[("lib/a.txt", Some("a\n"))], "First");

    let remote_path = fx.mirror_path.with_file_name("remote.git");
    git2::Repository::init_bare(&remote_path).unwrap();
    fx.mirror()
        .repository()
        .remote("origin", remote_path.to_str().unwrap())
        .unwrap();

    let mut options = fx.options(&["lib"]);
    options.remote = Some("origin".to_string());
    let report = fx.run(&a, options).unwrap();
    assert!(report.pushed);

    let remote = git2::Repository::open_bare(&remote_path).unwrap();
    let pushed = remote
        .find_reference("refs/heads/main")
        .unwrap()
        .target()
        .unwrap()
        .to_string();
    assert_eq!(pushed, branch_tip(&fx.mirror(), "main"));
}

use std::path::PathBuf;

use crate::common::{TestRepo, repo};
use rstest::rstest;

#[rstest]
fn test_new_creates_worktree_on_current_branch(repo: TestRepo) {
    let path = repo.st_new(&["feat/x"]);

    assert_eq!(path, repo.worktree_path("worktrees/feat/x"));
    assert_eq!(
        repo.git_output_in(&path, &["rev-parse", "--abbrev-ref", "HEAD"]),
        "feat/x"
    );
    assert_eq!(repo.config("branch.feat/x.parent").as_deref(), Some("main"));

    let readme = std::fs::read_to_string(path.join(".context/README.md")).unwrap();
    assert!(readme.contains("Created from: main"), "{readme}");

    let exclude = std::fs::read_to_string(repo.root_path().join(".git/info/exclude")).unwrap();
    assert!(exclude.lines().any(|l| l == "worktrees/"), "{exclude}");
    assert!(exclude.lines().any(|l| l == ".context/"), "{exclude}");

    // Worktrees and records stay out of the main worktree's status
    assert_eq!(repo.git_output(&["status", "--porcelain"]), "");
}

#[rstest]
fn test_new_nests_inside_parent_worktree(repo: TestRepo) {
    repo.st_new(&["feat/x"]);
    let path = repo.st_new(&["feat/y", "feat/x"]);

    assert_eq!(path, repo.worktree_path("worktrees/feat/x/feat/y"));
    assert_eq!(repo.config("branch.feat/y.parent").as_deref(), Some("feat/x"));

    // The nested worktree doesn't show up as untracked in its container
    let container = repo.worktree_path("worktrees/feat/x");
    assert_eq!(repo.git_output_in(&container, &["status", "--porcelain"]), "");
}

#[rstest]
fn test_new_from_inside_worktree_stacks_on_it(repo: TestRepo) {
    let x = repo.st_new(&["feat/x"]);
    repo.commit_file(&x, "x.txt", "x\n", "Add x");

    let y = repo.st_new_in(&x, &["fix/y"]);

    assert_eq!(y, repo.worktree_path("worktrees/feat/x/fix/y"));
    assert_eq!(repo.config("branch.fix/y.parent").as_deref(), Some("feat/x"));
    assert!(y.join("x.txt").exists());
}

#[rstest]
fn test_new_unknown_parent_falls_back_to_current(repo: TestRepo) {
    let out = repo.st(&["new", "feat/x", "feat/missing"]);
    out.assert_success();
    assert!(out.stderr.contains("Parent feat/missing not found"), "{}", out.stderr);
    assert_eq!(repo.config("branch.feat/x.parent").as_deref(), Some("main"));
}

#[rstest]
#[case::no_type("wip")]
#[case::unknown_type("stuff/thing")]
#[case::bad_ref("feat/a..b")]
fn test_new_rejects_invalid_name(repo: TestRepo, #[case] name: &str) {
    let out = repo.st(&["new", name]);

    out.assert_exit(1);
    assert!(out.stderr.contains("Invalid branch name"), "{}", out.stderr);
    assert!(!repo.branch_exists(name));
    assert!(!repo.worktree_path("worktrees").exists());
}

#[rstest]
fn test_new_reclaims_existing_branch(repo: TestRepo) {
    let path = repo.st_new(&["feat/x"]);
    repo.commit_file(&path, "old.txt", "old\n", "Old work");
    std::fs::write(path.join("dirty.txt"), "uncommitted\n").unwrap();

    let out = repo.st(&["new", "feat/x"]);
    out.assert_success();
    assert!(out.stderr.contains("Recreating feat/x"), "{}", out.stderr);

    assert!(path.is_dir());
    assert!(!path.join("dirty.txt").exists());
    assert!(!path.join("old.txt").exists());
    assert_eq!(
        repo.git_output(&["rev-parse", "feat/x"]),
        repo.git_output(&["rev-parse", "main"])
    );
    assert_eq!(repo.config("branch.feat/x.parent").as_deref(), Some("main"));
}

#[rstest]
fn test_new_perennial_branch_is_marked(repo: TestRepo) {
    let path = repo.st_new(&["develop"]);

    assert_eq!(path, repo.worktree_path("worktrees/develop"));
    assert_eq!(repo.config("branch.develop.parent"), None);
    assert_eq!(
        repo.config("git-town.perennial-branches").as_deref(),
        Some("develop")
    );
}

#[rstest]
fn test_new_copies_bootstrap_files(repo: TestRepo) {
    std::fs::write(repo.root_path().join("CLAUDE.md"), "# notes\n").unwrap();
    std::fs::write(repo.root_path().join(".envrc"), "use nix\n").unwrap();

    let out = repo.st(&["new", "feat/x"]);
    out.assert_success();

    let path = repo.worktree_path("worktrees/feat/x");
    assert_eq!(
        std::fs::read_to_string(path.join("CLAUDE.md")).unwrap(),
        "# notes\n"
    );
    assert!(path.join(".envrc").exists());
    assert!(!path.join("AGENTS.md").exists());
    assert!(out.stderr.contains("CLAUDE.md"), "{}", out.stderr);
}

#[rstest]
fn test_new_uses_configured_worktrees_dir(repo: TestRepo) {
    repo.write_config("worktrees-dir = \"trees\"\n");

    let path = repo.st_new(&["feat/x"]);

    assert_eq!(path, repo.worktree_path("trees/feat/x"));
    let exclude = std::fs::read_to_string(repo.root_path().join(".git/info/exclude")).unwrap();
    assert!(exclude.lines().any(|l| l == "trees/"), "{exclude}");
}

#[rstest]
fn test_new_refuses_to_reclaim_over_nested_worktrees(repo: TestRepo) {
    repo.st_new(&["feat/x"]);
    let y = repo.st_new(&["feat/y", "feat/x"]);
    repo.commit_file(&y, "y.txt", "y\n", "Add y");
    std::fs::write(y.join("wip.txt"), "uncommitted\n").unwrap();

    let out = repo.st(&["new", "feat/x"]);

    out.assert_exit(1);
    assert!(out.stderr.contains("other worktrees are nested inside it"), "{}", out.stderr);
    assert!(out.stderr.contains("feat/y"), "{}", out.stderr);
    assert!(!out.stderr.contains("Recreating"), "{}", out.stderr);
    assert!(y.join("wip.txt").exists());
    assert!(repo.branch_exists("feat/y"));
    assert!(
        repo.git_output(&["worktree", "list"]).contains("feat/x/feat/y"),
        "child worktree should stay registered"
    );
    assert_eq!(repo.config("branch.feat/y.parent").as_deref(), Some("feat/x"));
}

#[rstest]
fn test_new_rejects_branch_as_its_own_parent(repo: TestRepo) {
    let x = repo.st_new(&["feat/x"]);

    let out = repo.st(&["new", "feat/x", "feat/x"]);

    out.assert_exit(1);
    assert!(out.stderr.contains("Cannot stack feat/x on itself"), "{}", out.stderr);
    assert!(x.is_dir());
    assert!(!x.join("feat/x").exists());
    assert_eq!(repo.config("branch.feat/x.parent").as_deref(), Some("main"));
}

#[rstest]
fn test_new_reclaim_warning_names_the_destroyed_worktree(repo: TestRepo) {
    repo.st_new(&["feat/z"]);
    let old = repo.st_new(&["feat/x"]);

    let out = repo.st(&["new", "feat/x", "feat/z"]);
    out.assert_success();

    assert!(
        out.stderr
            .contains("Recreating feat/x: removing the existing worktree at worktrees/feat/x "),
        "{}",
        out.stderr
    );
    assert!(!old.exists());
    assert_eq!(
        PathBuf::from(out.stdout.trim()),
        repo.worktree_path("worktrees/feat/z/feat/x")
    );
    assert_eq!(repo.config("branch.feat/x.parent").as_deref(), Some("feat/z"));
}

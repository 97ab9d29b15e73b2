use crate::common::{TestRepo, repo};
use rstest::rstest;

/// `chore/z` has no commits of its own, `feat/u` has one.
fn merged_and_unmerged(repo: &TestRepo) {
    repo.st_new(&["chore/z"]);
    let u = repo.st_new(&["feat/u"]);
    repo.commit_file(&u, "u.txt", "u\n", "Add u");
}

#[rstest]
fn test_auto_clean_removes_merged_branches(repo: TestRepo) {
    merged_and_unmerged(&repo);

    let out = repo.st_with_input(&["auto-clean"], "y\n");
    out.assert_success();
    assert!(out.stderr.contains("Remove 1 merged branches"), "{}", out.stderr);

    assert!(!repo.branch_exists("chore/z"));
    assert!(!repo.worktree_path("worktrees/chore/z").exists());
    assert_eq!(repo.config("branch.chore/z.parent"), None);

    assert!(repo.branch_exists("feat/u"));
    assert!(repo.worktree_path("worktrees/feat/u").is_dir());
    let parents = repo.parents();
    assert_eq!(parents["feat/u"].as_deref(), Some("main"));
    assert!(!parents.contains_key("chore/z"));
}

#[rstest]
fn test_auto_clean_declined_keeps_everything(repo: TestRepo) {
    merged_and_unmerged(&repo);

    let out = repo.st_with_input(&["auto-clean"], "n\n");
    out.assert_success();
    assert!(repo.branch_exists("chore/z"));
    assert!(repo.worktree_path("worktrees/chore/z").is_dir());
}

#[rstest]
fn test_auto_clean_nothing_merged(repo: TestRepo) {
    let u = repo.st_new(&["feat/u"]);
    repo.commit_file(&u, "u.txt", "u\n", "Add u");

    let out = repo.st(&["auto-clean"]);
    out.assert_success();
    assert!(out.stderr.contains("No branches merged into main"), "{}", out.stderr);
    assert!(repo.branch_exists("feat/u"));
}

#[rstest]
fn test_auto_clean_after_local_merge(repo: TestRepo) {
    let u = repo.st_new(&["feat/u"]);
    repo.commit_file(&u, "u.txt", "u\n", "Add u");
    repo.st_in(&u, &["local-merge"]).assert_success();

    let out = repo.st_with_input(&["auto-clean"], "y\n");
    out.assert_success();
    assert!(!repo.branch_exists("feat/u"));
    assert!(repo.root_path().join("u.txt").exists());
}

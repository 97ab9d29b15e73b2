use crate::common::{TestRepo, repo, repo_with_remote, stacked_repo};
use rstest::rstest;

#[rstest]
fn test_local_merge_into_parent(repo: TestRepo) {
    let x = repo.st_new(&["feat/x"]);
    repo.commit_file(&x, "x.txt", "x\n", "Add x");

    let out = repo.st_in(&x, &["local-merge"]);
    out.assert_success();
    assert!(out.stderr.contains("Nothing was pushed"), "{}", out.stderr);

    assert!(repo.root_path().join("x.txt").exists());
    assert_eq!(
        repo.git_output(&["log", "-1", "--format=%s"]),
        "Local merge of feat/x into main (not pushed)"
    );
    // The branch and its worktree survive a local merge
    assert!(x.is_dir());
    assert!(repo.branch_exists("feat/x"));
}

#[rstest]
fn test_local_merge_conflict_leaves_parent_mid_merge(repo: TestRepo) {
    let x = repo.st_new(&["feat/x"]);
    repo.commit_file(repo.root_path(), "a.txt", "one\n", "Main side");
    repo.commit_file(&x, "a.txt", "two\n", "Branch side");

    let out = repo.st(&["local-merge", "feat/x"]);
    out.assert_exit(1);
    assert!(
        out.stderr.contains("Merging feat/x into main stopped with conflicts"),
        "{}",
        out.stderr
    );
    assert!(out.stderr.contains("a.txt"), "{}", out.stderr);
    assert!(repo.root_path().join(".git/MERGE_HEAD").exists());
}

#[rstest]
fn test_local_merge_refuses_perennial(repo: TestRepo) {
    let out = repo.st(&["local-merge"]);
    out.assert_exit(1);
    assert!(out.stderr.contains("Cannot local-merge main"), "{}", out.stderr);
}

#[rstest]
fn test_local_sync_all_merges_deepest_first(stacked_repo: TestRepo) {
    let x = stacked_repo.worktree_path("worktrees/feat/x");
    let y = stacked_repo.worktree_path("worktrees/feat/x/feat/y");
    stacked_repo.commit_file(&x, "x.txt", "x\n", "Add x");
    stacked_repo.commit_file(&y, "y.txt", "y\n", "Add y");

    let out = stacked_repo.st(&["local-sync-all"]);
    out.assert_success();
    assert!(out.stderr.contains("2 succeeded"), "{}", out.stderr);

    // feat/y reached feat/x before feat/x was merged into main
    assert!(x.join("y.txt").exists());
    assert!(stacked_repo.root_path().join("x.txt").exists());
    assert!(stacked_repo.root_path().join("y.txt").exists());
}

#[rstest]
fn test_local_sync_all_without_worktrees(repo: TestRepo) {
    let out = repo.st(&["local-sync-all"]);
    out.assert_success();
    assert!(out.stderr.contains("No stacked worktrees"), "{}", out.stderr);
}

#[rstest]
fn test_merge_branch_pushes_and_removes(repo_with_remote: TestRepo) {
    let repo = repo_with_remote;
    let x = repo.st_new(&["feat/x"]);
    repo.commit_file(&x, "x.txt", "x\n", "Add x");

    let out = repo.st(&["merge-branch", "feat/x"]);
    out.assert_success();

    assert_eq!(
        repo.git_output(&["log", "-1", "--format=%s"]),
        "Merge feat/x into main"
    );
    let remote_main = repo.git_output_in(repo.remote_path(), &["rev-parse", "main"]);
    assert_eq!(remote_main, repo.git_output(&["rev-parse", "main"]));
    assert!(!x.exists());
    assert!(!repo.branch_exists("feat/x"));
    assert_eq!(repo.config("branch.feat/x.parent"), None);
}

#[rstest]
fn test_merge_branch_refused_inside_its_worktree(repo_with_remote: TestRepo) {
    let repo = repo_with_remote;
    let x = repo.st_new(&["feat/x"]);
    repo.commit_file(&x, "x.txt", "x\n", "Add x");

    let out = repo.st_in(&x, &["merge-branch", "feat/x"]);
    out.assert_exit(1);
    assert!(
        out.stderr.contains("Cannot merge feat/x from inside its own worktree"),
        "{}",
        out.stderr
    );
    assert!(x.is_dir());
    assert!(!repo.root_path().join("x.txt").exists());
}

#[rstest]
fn test_stack_test_reports_each_worktree(stacked_repo: TestRepo) {
    stacked_repo.write_config("test-command = \"test -f ok.txt\"\n");
    let x = stacked_repo.worktree_path("worktrees/feat/x");
    let y = stacked_repo.worktree_path("worktrees/feat/x/feat/y");
    std::fs::write(y.join("ok.txt"), "").unwrap();

    let out = stacked_repo.st_in(&x, &["stack-test"]);
    out.assert_exit(1);
    assert!(out.stderr.contains("1 succeeded, 1 failed"), "{}", out.stderr);
}

#[rstest]
fn test_stack_test_requires_command(repo: TestRepo) {
    let out = repo.st(&["stack-test"]);
    out.assert_exit(1);
}

use crate::common::{TestRepo, repo, stacked_repo};
use rstest::rstest;

#[rstest]
fn test_stack_tree(stacked_repo: TestRepo) {
    let out = stacked_repo.st(&["stack"]);
    out.assert_success();

    insta::assert_snapshot!(out.stdout.trim_end(), @r"
    main @  .
    └── feat/x  worktrees/feat/x
        └── feat/y  worktrees/feat/x/feat/y
    ");
}

#[rstest]
fn test_stack_marks_current_branch(stacked_repo: TestRepo) {
    let x = stacked_repo.worktree_path("worktrees/feat/x");
    let out = stacked_repo.st_in(&x, &["stack"]);
    out.assert_success();

    assert!(out.stdout.contains("feat/x @  worktrees/feat/x"), "{}", out.stdout);
    assert!(out.stdout.lines().next().unwrap().starts_with("main  ."));
}

#[rstest]
fn test_cd_prints_worktree_path(stacked_repo: TestRepo) {
    let out = stacked_repo.st(&["cd", "feat/y"]);
    out.assert_success();
    assert_eq!(
        out.stdout.trim(),
        stacked_repo
            .worktree_path("worktrees/feat/x/feat/y")
            .display()
            .to_string()
    );
}

#[rstest]
fn test_cd_unknown_branch(repo: TestRepo) {
    let out = repo.st(&["cd", "feat/nope"]);
    out.assert_exit(1);
    assert!(out.stdout.is_empty());
    assert!(out.stderr.contains("No worktree for feat/nope"), "{}", out.stderr);
}

#[rstest]
fn test_list_shows_context(stacked_repo: TestRepo) {
    let out = stacked_repo.st(&["list"]);
    out.assert_success();

    let lines: Vec<&str> = out.stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{}", out.stdout);
    assert!(lines[0].starts_with("@ main"), "{}", out.stdout);
    assert!(lines.iter().any(|l| l.contains("feat/y") && l.contains("worktrees/feat/x/feat/y")));
}

#[rstest]
fn test_agent_status_lists_context_records(stacked_repo: TestRepo) {
    let out = stacked_repo.st(&["agent-status"]);
    out.assert_success();

    assert!(out.stdout.contains("feat/x  worktrees/feat/x  from main"), "{}", out.stdout);
    assert!(out.stdout.contains("from feat/x"), "{}", out.stdout);
}

#[rstest]
fn test_agent_status_without_worktrees(repo: TestRepo) {
    let out = repo.st(&["agent-status"]);
    out.assert_success();
    assert!(out.stdout.is_empty());
    assert!(out.stderr.contains("No worktrees carry agent context"), "{}", out.stderr);
}

#[rstest]
fn test_clean_reparents_children(stacked_repo: TestRepo) {
    let y = stacked_repo.worktree_path("worktrees/feat/x/feat/y");
    stacked_repo.commit_file(&y, "y.txt", "y\n", "Add y");

    // feat/y is nested inside feat/x's worktree, so it goes first
    let out = stacked_repo.st(&["clean", "feat/x", "-y"]);
    out.assert_exit(1);
    assert!(out.stderr.contains("other worktrees are nested inside it"), "{}", out.stderr);
    assert!(stacked_repo.branch_exists("feat/x"));

    let out = stacked_repo.st(&["clean", "feat/y", "-y"]);
    out.assert_success();
    assert!(!y.exists());
    assert!(!stacked_repo.branch_exists("feat/y"));
    assert_eq!(stacked_repo.config("branch.feat/y.parent"), None);
}

#[rstest]
fn test_clean_points_children_at_grandparent(repo: TestRepo) {
    repo.st_new(&["feat/x"]);
    // A child without a worktree of its own
    repo.run_git(&["branch", "feat/z", "feat/x"]);
    repo.run_git(&["config", "branch.feat/z.parent", "feat/x"]);

    let out = repo.st(&["clean", "feat/x", "-y"]);
    out.assert_success();

    assert!(!repo.branch_exists("feat/x"));
    assert_eq!(repo.config("branch.feat/z.parent").as_deref(), Some("main"));
    assert!(!repo.worktree_path("worktrees/feat/x").exists());
}

#[rstest]
fn test_clean_declined(repo: TestRepo) {
    repo.st_new(&["feat/x"]);

    let out = repo.st_with_input(&["clean", "feat/x"], "n\n");
    out.assert_exit(1);
    assert!(repo.branch_exists("feat/x"));
    assert!(repo.worktree_path("worktrees/feat/x").is_dir());
}

#[rstest]
fn test_clean_refuses_perennial(repo: TestRepo) {
    let out = repo.st(&["clean", "main", "-y"]);
    out.assert_exit(1);
    assert!(out.stderr.contains("perennial"), "{}", out.stderr);
}

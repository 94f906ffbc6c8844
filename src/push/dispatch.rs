//! push::dispatch
//!
//! Drives one push from accounting to delivery.
//!
//! # Design
//!
//! Changes are visited in [`Push::changes`] order (priority, then ref
//! name). For each change the dispatcher:
//!
//! 1. claims the change's new commits from the shared [`AttributionPool`];
//! 2. sends the change notification, or logs and skips it when the change
//!    has no recipients;
//! 3. sends one revision notification per claimed commit, oldest first,
//!    unless the claim exceeds the configured cap.
//!
//! Skipping a message never releases its commits back to the pool, so the
//! final pool check only fires on a genuine accounting inconsistency. That
//! check is reported, not fatal: by the time it runs some messages have
//! already gone out.

use super::accountant::{AttributionPool, ChangeCommits, Push};
use super::PushError;
use crate::core::environment::Environment;
use crate::core::types::{Oid, RefName};
use crate::git::Oracle;
use crate::notify::compose::Composer;
use crate::notify::mailer::Mailer;
use crate::ui::output::{self, Verbosity};

/// What a dispatch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Change notifications delivered
    pub changes_sent: usize,
    /// Revision notifications delivered
    pub revisions_sent: usize,
    /// Changes skipped for lack of recipients
    pub skipped: Vec<RefName>,
    /// Changes whose revision notifications were suppressed by the cap
    pub capped: Vec<RefName>,
    /// New commits no change claimed
    pub unclaimed: Vec<Oid>,
}

/// Sends the notifications for a push.
pub struct Dispatcher<'a> {
    oracle: &'a dyn Oracle,
    env: &'a Environment,
    verbosity: Verbosity,
}

impl<'a> Dispatcher<'a> {
    pub fn new(oracle: &'a dyn Oracle, env: &'a Environment, verbosity: Verbosity) -> Self {
        Self {
            oracle,
            env,
            verbosity,
        }
    }

    /// Account for and deliver every notification of `push`.
    ///
    /// # Errors
    ///
    /// Any repository, rendering or delivery failure aborts the run.
    pub fn run(&self, push: &Push, mailer: &mut dyn Mailer) -> Result<DispatchReport, PushError> {
        let composer = Composer::new(self.oracle, self.env, self.verbosity);
        let mut pool = AttributionPool::new(push.new_commits(self.oracle)?);
        let mut report = DispatchReport::default();

        output::debug(
            format!(
                "{} change(s), {} new commit(s)",
                push.changes().len(),
                pool.len()
            ),
            self.verbosity,
        );

        for change in push.changes() {
            let commits = ChangeCommits::account(self.oracle, push, change, &mut pool)?;

            if change.recipients.is_empty() {
                output::warn(
                    format!(
                        "no recipients configured so no notification will be sent for '{}' update {}->{}",
                        change.refname,
                        change.old.full(),
                        change.new.full()
                    ),
                    self.verbosity,
                );
                report.skipped.push(change.refname.clone());
            } else {
                output::info(
                    format!(
                        "Sending notification emails to: {}",
                        change.recipients.join(", ")
                    ),
                    self.verbosity,
                );
                let lines = composer.change_message(change, &commits)?;
                mailer.send(&lines, &change.recipients)?;
                report.changes_sent += 1;
            }

            if let Some(max) = self.env.max_commit_emails {
                if commits.claimed.len() > max {
                    output::warn(
                        format!(
                            "too many new commits ({}) on '{}', not sending commit emails; \
                             max_commit_emails is currently {}",
                            commits.claimed.len(),
                            change.refname,
                            max
                        ),
                        self.verbosity,
                    );
                    report.capped.push(change.refname.clone());
                    continue;
                }
            }

            if self.env.pools.revision.is_empty() {
                if !commits.claimed.is_empty() {
                    output::debug(
                        format!(
                            "no commit recipients; {} commit(s) on '{}' not announced",
                            commits.claimed.len(),
                            change.refname
                        ),
                        self.verbosity,
                    );
                }
                continue;
            }

            for revision in commits.revisions(change, &self.env.pools.revision) {
                let lines = composer.revision_message(&revision)?;
                mailer.send(&lines, &revision.recipients)?;
                report.revisions_sent += 1;
            }
        }

        report.unclaimed = pool.into_leftover();
        if !report.unclaimed.is_empty() {
            output::error(format!(
                "no emails were sent for the following new commits:\n{}",
                output::format_list(&report.unclaimed, "    ")
            ));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RecipientPools, ReplyTo};
    use crate::git::mock::{FailOn, MockRepo};
    use crate::git::GitError;
    use crate::notify::filter::BodyLimits;
    use crate::notify::mailer::{MailError, RecordingMailer, SentMessage};
    use crate::push::change::{Change, RawUpdate};
    use std::path::PathBuf;

    fn pools() -> RecipientPools {
        RecipientPools {
            refchange: vec!["refs@example.com".to_string()],
            announce: vec!["announce@example.com".to_string()],
            revision: vec!["commits@example.com".to_string()],
        }
    }

    fn env(pools: RecipientPools) -> Environment {
        Environment {
            repo_shortname: "widgets".to_string(),
            repo_path: PathBuf::from("/srv/git/widgets.git"),
            projectdesc: "Widgets".to_string(),
            administrator: "admin@example.com".to_string(),
            emailprefix: "[widgets] ".to_string(),
            pusher: "alice".to_string(),
            pusher_email: Some("alice@example.com".to_string()),
            fromaddr: None,
            sender: None,
            pools,
            limits: BodyLimits::default(),
            reply_to_refchange: ReplyTo::Pusher,
            reply_to_commit: ReplyTo::Author,
            announce_shortlog: false,
            refchange_showlog: false,
            max_commit_emails: None,
        }
    }

    fn push(repo: &MockRepo, env: &Environment, updates: &[(Option<&Oid>, Option<&Oid>, &str)]) -> Push {
        let changes = updates
            .iter()
            .map(|(old, new, refname)| {
                let update = RawUpdate {
                    old: old.cloned(),
                    new: new.cloned(),
                    refname: RefName::new(*refname).unwrap(),
                };
                let mut change = Change::classify(repo, &update).unwrap().change;
                change.assign_recipients(&env.pools);
                change
            })
            .collect();
        Push::new(repo, changes).unwrap()
    }

    fn subjects(sent: &[SentMessage]) -> Vec<String> {
        sent.iter()
            .map(|m| m.header("Subject").unwrap_or_default().to_string())
            .collect()
    }

    fn run(repo: &MockRepo, env: &Environment, push: &Push) -> (DispatchReport, Vec<SentMessage>) {
        let mut mailer = RecordingMailer::new();
        let report = Dispatcher::new(repo, env, Verbosity::Quiet)
            .run(push, &mut mailer)
            .unwrap();
        (report, mailer.sent())
    }

    mod delivery {
        use super::*;

        #[test]
        fn change_then_revisions_in_order() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Second", &[a.clone()]);
            let c = repo.commit("Third", &[b.clone()]);
            repo.set_ref("refs/heads/main", &c);
            let env = env(pools());
            let push = push(&repo, &env, &[(Some(&a), Some(&c), "refs/heads/main")]);

            let (report, sent) = run(&repo, &env, &push);

            assert_eq!(
                subjects(&sent),
                vec![
                    format!("[widgets] branch main updated ({} -> {})", a.short(7), c.short(7)),
                    "[widgets] 01/02: Second".to_string(),
                    "[widgets] 02/02: Third".to_string(),
                ]
            );
            let msgid = sent[0].header("Message-ID").unwrap();
            assert_eq!(sent[1].header("In-Reply-To"), Some(msgid));
            assert_eq!(sent[2].header("In-Reply-To"), Some(msgid));
            assert_eq!(sent[1].recipients, vec!["commits@example.com"]);
            assert_eq!(report.changes_sent, 1);
            assert_eq!(report.revisions_sent, 2);
            assert!(report.unclaimed.is_empty());
        }

        #[test]
        fn changes_follow_priority_order() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Next", &[a.clone()]);
            repo.set_ref("refs/heads/main", &b);
            repo.set_ref("refs/tags/v1", &b);
            let env = env(pools());
            let push = push(
                &repo,
                &env,
                &[
                    (None, Some(&b), "refs/tags/v1"),
                    (Some(&a), None, "refs/heads/gone"),
                    (Some(&a), Some(&b), "refs/heads/main"),
                ],
            );

            let (_, sent) = run(&repo, &env, &push);
            let refnames: Vec<&str> = sent
                .iter()
                .filter(|m| m.header("Message-ID").is_some())
                .map(|m| m.header("X-Git-Refname").unwrap())
                .collect();
            assert_eq!(refnames, vec!["refs/heads/main", "refs/tags/v1", "refs/heads/gone"]);
        }

        #[test]
        fn shared_commit_announced_once() {
            let mut repo = MockRepo::new();
            let base = repo.commit("Base", &[]);
            let feature = repo.commit("Shared feature", &[base.clone()]);
            let one = repo.commit("Only on one", &[feature.clone()]);
            let two = repo.commit("Only on two", &[feature.clone()]);
            repo.set_ref("refs/heads/main", &base);
            repo.set_ref("refs/heads/one", &one);
            repo.set_ref("refs/heads/two", &two);
            let env = env(pools());
            let push = push(
                &repo,
                &env,
                &[
                    (None, Some(&two), "refs/heads/two"),
                    (None, Some(&one), "refs/heads/one"),
                ],
            );

            let (report, sent) = run(&repo, &env, &push);

            let shared: Vec<&SentMessage> = sent
                .iter()
                .filter(|m| m.header("X-Git-Rev") == Some(feature.as_str()))
                .collect();
            assert_eq!(shared.len(), 1);
            assert_eq!(shared[0].header("X-Git-Refname"), Some("refs/heads/one"));
            assert_eq!(report.revisions_sent, 3);

            let two_change = sent
                .iter()
                .find(|m| {
                    m.header("Message-ID").is_some()
                        && m.header("X-Git-Refname") == Some("refs/heads/two")
                })
                .unwrap();
            let adds = format!("      adds  {}   Shared feature", feature.short(7));
            assert!(two_change.body().contains(&adds));
        }
    }

    mod recipients {
        use super::*;

        #[test]
        fn change_without_recipients_still_announces_commits() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Second", &[a.clone()]);
            repo.set_ref("refs/heads/main", &b);
            let env = env(RecipientPools {
                refchange: vec![],
                ..pools()
            });
            let push = push(&repo, &env, &[(Some(&a), Some(&b), "refs/heads/main")]);

            let (report, sent) = run(&repo, &env, &push);
            assert_eq!(report.changes_sent, 0);
            assert_eq!(report.skipped.len(), 1);
            assert_eq!(subjects(&sent), vec!["[widgets] 01/01: Second"]);
            assert!(report.unclaimed.is_empty());
        }

        #[test]
        fn empty_revision_pool_sends_no_commit_emails() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Second", &[a.clone()]);
            repo.set_ref("refs/heads/main", &b);
            let env = env(RecipientPools {
                revision: vec![],
                ..pools()
            });
            let push = push(&repo, &env, &[(Some(&a), Some(&b), "refs/heads/main")]);

            let (report, sent) = run(&repo, &env, &push);
            assert_eq!(sent.len(), 1);
            assert_eq!(report.revisions_sent, 0);
            assert!(report.unclaimed.is_empty());
        }
    }

    mod limits {
        use super::*;

        #[test]
        fn cap_skips_revisions_but_keeps_claims() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Second", &[a.clone()]);
            let c = repo.commit("Third", &[b.clone()]);
            let t = repo.commit("Tag target", &[a.clone()]);
            repo.set_ref("refs/heads/main", &c);
            repo.set_ref("refs/tags/t", &t);
            let env = Environment {
                max_commit_emails: Some(1),
                ..env(pools())
            };
            let push = push(
                &repo,
                &env,
                &[
                    (Some(&a), Some(&c), "refs/heads/main"),
                    (None, Some(&t), "refs/tags/t"),
                ],
            );

            let (report, sent) = run(&repo, &env, &push);
            assert_eq!(report.capped, vec![RefName::new("refs/heads/main").unwrap()]);
            // Later changes are still processed
            assert_eq!(report.changes_sent, 2);
            assert_eq!(report.revisions_sent, 1);
            assert!(report.unclaimed.is_empty());
            assert!(subjects(&sent).contains(&"[widgets] 01/01: Tag target".to_string()));
        }
    }

    mod leftovers {
        use super::*;
        use crate::core::types::ObjectType;
        use crate::git::{CommitInfo, PreviousTag, RefEntry, TagInfo, WalkOrder};

        /// Reports `extra` from every multi-tip walk but from no single-tip
        /// walk, so the push-wide count disagrees with the per-change ones.
        struct InconsistentRepo {
            inner: MockRepo,
            extra: Oid,
        }

        impl Oracle for InconsistentRepo {
            fn object_type(&self, oid: &Oid) -> Result<ObjectType, GitError> {
                self.inner.object_type(oid)
            }
            fn peel_to_commit(&self, oid: &Oid) -> Result<Option<Oid>, GitError> {
                self.inner.peel_to_commit(oid)
            }
            fn short_id(&self, oid: &Oid) -> Result<String, GitError> {
                self.inner.short_id(oid)
            }
            fn list_refs(&self) -> Result<Vec<RefEntry>, GitError> {
                self.inner.list_refs()
            }
            fn rev_list(
                &self,
                include: &[Oid],
                exclude: &[Oid],
                order: WalkOrder,
            ) -> Result<Vec<Oid>, GitError> {
                let mut commits = self.inner.rev_list(include, exclude, order)?;
                if include.len() > 1 {
                    commits.push(self.extra.clone());
                }
                Ok(commits)
            }
            fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
                self.inner.commit_info(oid)
            }
            fn commit_patch(&self, oid: &Oid) -> Result<Vec<String>, GitError> {
                self.inner.commit_patch(oid)
            }
            fn diff_stat(&self, old: &Oid, new: &Oid) -> Result<Vec<String>, GitError> {
                self.inner.diff_stat(old, new)
            }
            fn tag_info(&self, oid: &Oid) -> Result<TagInfo, GitError> {
                self.inner.tag_info(oid)
            }
            fn previous_tag(&self, commit: &Oid) -> Result<Option<PreviousTag>, GitError> {
                self.inner.previous_tag(commit)
            }
            fn object_size(&self, oid: &Oid) -> Result<usize, GitError> {
                self.inner.object_size(oid)
            }
            fn resolve_revision(&self, spec: &str) -> Result<Oid, GitError> {
                self.inner.resolve_revision(spec)
            }
        }

        #[test]
        fn unclaimed_commits_are_reported_after_delivery() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("On one", &[a.clone()]);
            let c = repo.commit("Never pushed", &[a.clone()]);
            let d = repo.commit("On two", &[a.clone()]);
            repo.set_ref("refs/heads/main", &a);
            repo.set_ref("refs/heads/one", &b);
            repo.set_ref("refs/heads/two", &d);
            let env = env(pools());
            let push = push(
                &repo,
                &env,
                &[
                    (None, Some(&b), "refs/heads/one"),
                    (None, Some(&d), "refs/heads/two"),
                ],
            );
            let oracle = InconsistentRepo {
                inner: repo,
                extra: c.clone(),
            };

            let mut mailer = RecordingMailer::new();
            let report = Dispatcher::new(&oracle, &env, Verbosity::Quiet)
                .run(&push, &mut mailer)
                .unwrap();

            assert_eq!(report.unclaimed, vec![c.clone()]);
            assert_eq!(report.changes_sent, 2);
            assert_eq!(report.revisions_sent, 2);
            let sent = mailer.sent();
            assert_eq!(sent.len(), 4);
            assert!(sent
                .iter()
                .all(|m| m.header("X-Git-Rev") != Some(c.as_str())));
        }
    }

    mod failures {
        use super::*;

        struct BrokenMailer;

        impl Mailer for BrokenMailer {
            fn send(&mut self, _lines: &[String], _recipients: &[String]) -> Result<(), MailError> {
                Err(MailError::CommandFailed {
                    command: "sendmail".to_string(),
                    status: "exit status: 75".to_string(),
                })
            }
        }

        #[test]
        fn delivery_failure_aborts() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            repo.set_ref("refs/heads/main", &a);
            let env = env(pools());
            let push = push(&repo, &env, &[(None, Some(&a), "refs/heads/main")]);

            let err = Dispatcher::new(&repo, &env, Verbosity::Quiet)
                .run(&push, &mut BrokenMailer)
                .unwrap_err();
            assert!(matches!(err, PushError::Mail(_)));
        }

        #[test]
        fn oracle_failure_aborts() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Second", &[a.clone()]);
            repo.set_ref("refs/heads/main", &b);
            let env = env(pools());
            let push = push(&repo, &env, &[(Some(&a), Some(&b), "refs/heads/main")]);
            repo.fail_on(FailOn::RevList);

            let mut mailer = RecordingMailer::new();
            let err = Dispatcher::new(&repo, &env, Verbosity::Quiet)
                .run(&push, &mut mailer)
                .unwrap_err();
            assert!(matches!(err, PushError::Git(GitError::Internal { .. })));
            assert!(mailer.sent().is_empty());
        }
    }
}

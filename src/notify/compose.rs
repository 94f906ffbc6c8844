//! notify::compose
//!
//! Rendering of change and revision notifications.
//!
//! # Design
//!
//! Every message is assembled the same way: header lines, a blank line,
//! the intro paragraph, the body, then the footer. Only the body passes
//! through [`filter_body`].
//!
//! The body of a change notification has two parts:
//!
//! 1. A per-kind summary chosen from [`summary_steps`], a table keyed on
//!    `(ChangeVariant, ChangeKind)`.
//! 2. The revision change summary, which depends only on which endpoints
//!    resolve to commits: new commits for a creation, added/removed
//!    commits plus a diff-stat for an update, discarded commits for a
//!    deletion.
//!
//! In commit listings a commit is marked "new" only if this change claimed
//! it; commits claimed by an earlier change of the same push are "adds".

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use super::filter::filter_body;
use super::template::{self, expand_lines, expand_one, MessageKind, TemplateError, Values};
use crate::core::config::ReplyTo;
use crate::core::environment::Environment;
use crate::core::types::{ObjectType, Oid};
use crate::git::{CommitInfo, GitError, Oracle, WalkOrder};
use crate::push::{Change, ChangeCommits, ChangeKind, ChangeVariant, ObjectRef, Revision};
use crate::ui::output::{self, Verbosity};

/// Date format used in commit logs and tag descriptions.
const DATE_FORMAT: &str = "%a %b %-d %H:%M:%S %Y %z";

/// Errors from rendering a message.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

// =============================================================================
// Per-kind summary table
// =============================================================================

/// Which endpoint of a change a step refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Old,
    New,
}

/// One step of the per-kind summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStep {
    /// A one-line summary of an endpoint under the given action word
    Brief(&'static str, Endpoint),
    /// A fixed template
    Template(&'static str),
    /// The description of the new annotated tag object
    DescribeTag,
    Blank,
}

use SummaryStep::{Blank, Brief, DescribeTag, Template};

/// The per-kind summary steps for a change.
pub fn summary_steps(variant: ChangeVariant, kind: ChangeKind) -> &'static [SummaryStep] {
    match (variant, kind) {
        (ChangeVariant::Branch | ChangeVariant::Other, ChangeKind::Create) => {
            &[Brief("at", Endpoint::New), Blank]
        }
        (ChangeVariant::Branch | ChangeVariant::Other, ChangeKind::Update) => &[],
        (ChangeVariant::Branch | ChangeVariant::Other, ChangeKind::Delete) => {
            &[Brief("was", Endpoint::Old), Blank]
        }
        (ChangeVariant::AnnotatedTag, ChangeKind::Create) => {
            &[Template(template::TAG_CREATED), DescribeTag]
        }
        (ChangeVariant::AnnotatedTag, ChangeKind::Update) => {
            &[Template(template::TAG_UPDATED), DescribeTag]
        }
        (ChangeVariant::AnnotatedTag, ChangeKind::Delete) => &[
            Template(template::TAG_DELETED),
            Template(template::TAG_WAS),
            Blank,
        ],
        (ChangeVariant::LightweightTag, ChangeKind::Create) => &[Template(template::TAG_CREATED)],
        (ChangeVariant::LightweightTag, ChangeKind::Update) => &[Template(template::TAG_UPDATED)],
        (ChangeVariant::LightweightTag, ChangeKind::Delete) => &[
            Template(template::TAG_DELETED),
            Brief("was", Endpoint::Old),
            Blank,
        ],
    }
}

// =============================================================================
// Composer
// =============================================================================

/// Renders notifications for one push.
pub struct Composer<'a> {
    oracle: &'a dyn Oracle,
    env: &'a Environment,
    verbosity: Verbosity,
}

impl<'a> Composer<'a> {
    pub fn new(oracle: &'a dyn Oracle, env: &'a Environment, verbosity: Verbosity) -> Self {
        Self {
            oracle,
            env,
            verbosity,
        }
    }

    /// Values every message can reference.
    fn environment_values(&self, kind: MessageKind) -> Values {
        let env = self.env;
        let mut values = Values::new(kind);
        values.set("repo_shortname", env.repo_shortname.as_str());
        values.set("repo_path", env.repo_path.display().to_string());
        values.set("projectdesc", env.projectdesc.as_str());
        values.set("administrator", env.administrator.as_str());
        values.set("emailprefix", env.emailprefix.as_str());
        values.set("pusher", env.pusher.as_str());
        values.set_opt("pusher_email", env.pusher_email.as_deref());
        values.set_opt("fromaddr", env.fromaddr.as_deref());
        values.set_opt("sender", env.sender.as_deref());
        values
    }

    /// Apply a Reply-To policy. An unresolvable identity leaves the field
    /// unset, which drops the header line.
    fn set_reply_to(&self, values: &mut Values, policy: &ReplyTo, author: Option<&str>) {
        match policy {
            ReplyTo::Author => match author {
                Some(author) => values.set("reply_to", author),
                None => output::warn("no author email found; cannot set Reply-To", self.verbosity),
            },
            ReplyTo::Pusher => match self.env.pusher_email.as_deref() {
                Some(email) => values.set("reply_to", email),
                None => output::warn("no pusher email found; cannot set Reply-To", self.verbosity),
            },
            ReplyTo::None => {}
            ReplyTo::Literal(address) => values.set("reply_to", address.as_str()),
        }
    }

    /// Values for a change notification.
    pub fn change_values(&self, change: &Change) -> Result<Values, ComposeError> {
        let mut values = self.environment_values(MessageKind::RefChange);
        values.set("change_type", change.kind.as_str());
        values.set("refname_type", change.variant.refname_type());
        values.set("refname", change.refname.as_str());
        values.set("short_refname", change.short_name.as_str());
        values.set("msgid", change.msgid.as_str());
        values.set("recipients", change.recipients.join(", "));
        values.set("oldrev", change.old.full());
        values.set("oldrev_short", change.old.short.as_str());
        values.set("newrev", change.new.full());
        values.set("newrev_short", change.new.short.as_str());
        if change.old.is_present() {
            values.set("oldrev_type", change.old.kind.as_str());
        }
        if change.new.is_present() {
            values.set("newrev_type", change.new.kind.as_str());
        }
        self.set_reply_to(&mut values, &self.env.reply_to_refchange, None);

        let subject = match change.kind {
            ChangeKind::Create => template::REF_CREATED_SUBJECT,
            ChangeKind::Update => template::REF_UPDATED_SUBJECT,
            ChangeKind::Delete => template::REF_DELETED_SUBJECT,
        };
        let subject = expand_one(subject, &values)?;
        values.set("subject", subject);
        Ok(values)
    }

    /// Render the notification for a change.
    pub fn change_message(
        &self,
        change: &Change,
        commits: &ChangeCommits,
    ) -> Result<Vec<String>, ComposeError> {
        let values = self.change_values(change)?;

        let mut body = Vec::new();
        for step in summary_steps(change.variant, change.kind) {
            self.summary_step(&mut body, *step, change, &values)?;
        }
        self.revision_change_summary(&mut body, change, commits, &values)?;

        self.assemble(
            template::REFCHANGE_HEADER,
            template::REFCHANGE_INTRO,
            body,
            &values,
        )
    }

    /// Values for a revision notification.
    pub fn revision_values(
        &self,
        revision: &Revision<'_>,
        info: &CommitInfo,
    ) -> Result<Values, ComposeError> {
        let change = revision.change;
        let mut values = self.environment_values(MessageKind::Revision);
        values.set("rev", revision.commit.as_str());
        values.set("rev_short", self.oracle.short_id(&revision.commit)?);
        values.set("change_type", change.kind.as_str());
        values.set("refname", change.refname.as_str());
        values.set("short_refname", change.short_name.as_str());
        values.set("refname_type", change.variant.refname_type());
        values.set("reply_to_msgid", change.msgid.as_str());
        values.set("num", revision.num.to_string());
        values.set("tot", revision.tot.to_string());
        values.set("recipients", revision.recipients.join(", "));
        values.set("oneline", info.summary.as_str());

        let author = info.author_identity();
        values.set_opt("author", author.as_deref());
        self.set_reply_to(&mut values, &self.env.reply_to_commit, author.as_deref());
        Ok(values)
    }

    /// Render the notification for one announced commit.
    pub fn revision_message(&self, revision: &Revision<'_>) -> Result<Vec<String>, ComposeError> {
        let info = self.oracle.commit_info(&revision.commit)?;
        let values = self.revision_values(revision, &info)?;

        let mut body = self.log_entry(&info)?;
        body.push("---".to_string());
        body.extend(self.oracle.commit_patch(&revision.commit)?);

        self.assemble(
            template::REVISION_HEADER,
            template::REVISION_INTRO,
            body,
            &values,
        )
    }

    fn assemble(
        &self,
        header: &str,
        intro: &str,
        body: Vec<String>,
        values: &Values,
    ) -> Result<Vec<String>, ComposeError> {
        let mut lines = expand_lines(header, values, self.verbosity)?;
        lines.push(String::new());
        lines.extend(expand_lines(intro, values, self.verbosity)?);
        lines.extend(filter_body(body, &self.env.limits));
        lines.extend(expand_lines(template::FOOTER, values, self.verbosity)?);
        Ok(lines)
    }

    // =========================================================================
    // Change summaries
    // =========================================================================

    fn summary_step(
        &self,
        body: &mut Vec<String>,
        step: SummaryStep,
        change: &Change,
        values: &Values,
    ) -> Result<(), ComposeError> {
        match step {
            SummaryStep::Brief(action, endpoint) => {
                let endpoint = match endpoint {
                    Endpoint::Old => &change.old,
                    Endpoint::New => &change.new,
                };
                let (short, text) = self.endpoint_summary(endpoint)?;
                body.push(brief(values, action, &short, &text)?);
            }
            SummaryStep::Template(text) => {
                body.extend(expand_lines(text, values, self.verbosity)?);
            }
            SummaryStep::DescribeTag => self.describe_tag(body, change, values)?,
            SummaryStep::Blank => body.push(String::new()),
        }
        Ok(())
    }

    /// Short id and subject of an endpoint; objects that are not commits
    /// are described by their type.
    fn endpoint_summary(&self, endpoint: &ObjectRef) -> Result<(String, String), ComposeError> {
        match (&endpoint.id, &endpoint.kind) {
            (Some(id), ObjectType::Commit) => {
                let summary = self.oracle.summary(id)?;
                Ok((summary.short, summary.subject))
            }
            _ => Ok((endpoint.short.clone(), format!("({})", endpoint.kind))),
        }
    }

    fn revision_change_summary(
        &self,
        body: &mut Vec<String>,
        change: &Change,
        commits: &ChangeCommits,
        values: &Values,
    ) -> Result<(), ComposeError> {
        match (&change.old.commit, &change.new.commit) {
            (None, Some(_)) => {
                if commits.reachable_new.is_empty() {
                    body.extend(expand_lines(template::NO_NEW_REVISIONS, values, self.verbosity)?);
                    return Ok(());
                }
                body.push(expand_one(template::INCLUDES_NEW_COMMITS, values)?);
                body.push(String::new());
                for oid in &commits.reachable_new {
                    let summary = self.oracle.summary(oid)?;
                    let action = if commits.claimed_set.contains(&summary.short) {
                        "new"
                    } else {
                        "adds"
                    };
                    body.push(brief(values, action, &summary.short, &summary.subject)?);
                }
                body.push(String::new());
                self.new_revisions(body, commits, values)?;
            }
            (Some(old), Some(new)) => {
                let adds = self.oracle.summaries(
                    std::slice::from_ref(new),
                    std::slice::from_ref(old),
                    WalkOrder::OldestFirst,
                )?;
                let discards = self.oracle.summaries(
                    std::slice::from_ref(old),
                    std::slice::from_ref(new),
                    WalkOrder::NewestFirst,
                )?;

                if !discards.is_empty() {
                    for summary in &discards {
                        let action = if commits.discarded_set.contains(&summary.short) {
                            "discards"
                        } else {
                            "omits"
                        };
                        body.push(brief(values, action, &summary.short, &summary.subject)?);
                    }
                } else if !adds.is_empty() {
                    let from = self.oracle.summary(old)?;
                    body.push(brief(values, "from", &from.short, &from.subject)?);
                }
                for summary in &adds {
                    let action = if commits.claimed_set.contains(&summary.short) {
                        "new"
                    } else {
                        "adds"
                    };
                    body.push(brief(values, action, &summary.short, &summary.subject)?);
                }
                if !discards.is_empty() {
                    body.push(String::new());
                    let explanation = if adds.is_empty() {
                        template::REWIND_ONLY
                    } else {
                        template::NON_FF
                    };
                    body.extend(expand_lines(explanation, values, self.verbosity)?);
                }

                body.push(String::new());
                self.new_revisions(body, commits, values)?;

                body.push(String::new());
                body.push("Summary of changes:".to_string());
                body.extend(self.oracle.diff_stat(old, new)?);
            }
            (Some(_), None) => {
                if commits.discarded.is_empty() {
                    body.extend(expand_lines(
                        template::NO_DISCARDED_REVISIONS,
                        values,
                        self.verbosity,
                    )?);
                    return Ok(());
                }
                body.extend(expand_lines(template::DISCARDED_REVISIONS, values, self.verbosity)?);
                body.push(String::new());
                for oid in &commits.discarded {
                    let summary = self.oracle.summary(oid)?;
                    body.push(brief(values, "discards", &summary.short, &summary.subject)?);
                }
            }
            (None, None) => {
                body.extend(expand_lines(template::NON_COMMIT_UPDATE, values, self.verbosity)?);
            }
        }
        Ok(())
    }

    /// The "new revisions" paragraph, plus the detailed log when enabled.
    fn new_revisions(
        &self,
        body: &mut Vec<String>,
        commits: &ChangeCommits,
        values: &Values,
    ) -> Result<(), ComposeError> {
        if commits.claimed.is_empty() {
            body.extend(expand_lines(template::NO_NEW_REVISIONS, values, self.verbosity)?);
            return Ok(());
        }

        let tot = commits.claimed.len().to_string();
        body.extend(expand_lines(
            template::NEW_REVISIONS,
            &values.with(&[("tot", tot.as_str())]),
            self.verbosity,
        )?);

        if self.env.refchange_showlog {
            body.push(String::new());
            body.push("Detailed log of new commits:".to_string());
            body.push(String::new());
            for (i, oid) in commits.claimed.iter().rev().enumerate() {
                if i > 0 {
                    body.push(String::new());
                }
                body.extend(self.log_entry(&self.oracle.commit_info(oid)?)?);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Tags
    // =========================================================================

    fn describe_tag(
        &self,
        body: &mut Vec<String>,
        change: &Change,
        values: &Values,
    ) -> Result<(), ComposeError> {
        let Some(tag_id) = &change.new.id else {
            return Ok(());
        };
        let tag = self.oracle.tag_info(tag_id)?;
        let target_short = self.oracle.short_id(&tag.target)?;

        body.push(brief(
            values,
            "tagging",
            &target_short,
            &format!("({})", tag.target_kind),
        )?);

        let previous = if tag.target_kind == ObjectType::Commit {
            let previous = self.oracle.previous_tag(&tag.target)?;
            if let Some(previous) = &previous {
                body.push(format!("  replaces  {}", previous.name));
            }
            previous
        } else {
            body.push(format!(
                "    length  {} bytes",
                self.oracle.object_size(&tag.target)?
            ));
            None
        };

        if let Some(tagger) = &tag.tagger {
            body.push(format!(" tagged by  {}", tagger));
        }
        if let Some(date) = &tag.date {
            body.push(format!("        on  {}", format_date(date)));
        }
        body.push(String::new());

        body.push(template::LOGBEGIN.to_string());
        body.extend(tag.message.lines().map(str::to_string));

        if self.env.announce_shortlog && tag.target_kind == ObjectType::Commit {
            body.push(String::new());
            let since: Vec<Oid> = previous.into_iter().map(|p| p.commit).collect();
            body.extend(self.shortlog(&tag.target, &since)?);
        }

        body.push(template::LOGEND.to_string());
        body.push(String::new());
        Ok(())
    }

    /// Commit subjects grouped by author, authors sorted by name.
    fn shortlog(&self, tip: &Oid, since: &[Oid]) -> Result<Vec<String>, ComposeError> {
        let mut by_author: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for oid in self
            .oracle
            .rev_list(std::slice::from_ref(tip), since, WalkOrder::OldestFirst)?
        {
            let info = self.oracle.commit_info(&oid)?;
            by_author
                .entry(info.author_name)
                .or_default()
                .push(info.summary);
        }

        let mut lines = Vec::new();
        for (author, subjects) in by_author {
            lines.push(format!("{} ({}):", author, subjects.len()));
            lines.extend(subjects.iter().map(|subject| format!("      {}", subject)));
            lines.push(String::new());
        }
        Ok(lines)
    }

    // =========================================================================
    // Commit logs
    // =========================================================================

    /// A commit as shown by `git log`.
    fn log_entry(&self, info: &CommitInfo) -> Result<Vec<String>, ComposeError> {
        let mut lines = vec![format!("commit {}", info.oid)];
        if info.parents.len() > 1 {
            let parents = info
                .parents
                .iter()
                .map(|parent| self.oracle.short_id(parent))
                .collect::<Result<Vec<_>, _>>()?;
            lines.push(format!("Merge: {}", parents.join(" ")));
        }
        lines.push(format!("Author: {} <{}>", info.author_name, info.author_email));
        lines.push(format!("Date:   {}", format_date(&info.author_time)));
        lines.push(String::new());
        lines.extend(info.message.trim_end().lines().map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        }));
        Ok(lines)
    }
}

/// One commit-listing line.
fn brief(values: &Values, action: &str, short: &str, text: &str) -> Result<String, TemplateError> {
    expand_one(
        template::BRIEF_SUMMARY,
        &values.with(&[("action", action), ("rev_short", short), ("text", text)]),
    )
}

fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RecipientPools;
    use crate::core::types::RefName;
    use crate::git::mock::MockRepo;
    use crate::notify::filter::BodyLimits;
    use crate::push::{AttributionPool, Push, RawUpdate};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn env() -> Environment {
        Environment {
            repo_shortname: "widgets".to_string(),
            repo_path: PathBuf::from("/srv/git/widgets.git"),
            projectdesc: "Widgets".to_string(),
            administrator: "admin@example.com".to_string(),
            emailprefix: "[widgets] ".to_string(),
            pusher: "alice".to_string(),
            pusher_email: Some("alice@example.com".to_string()),
            fromaddr: Some("Hooks <hooks@example.com>".to_string()),
            sender: None,
            pools: RecipientPools {
                refchange: vec!["refs@example.com".to_string()],
                announce: vec!["announce@example.com".to_string()],
                revision: vec!["commits@example.com".to_string()],
            },
            limits: BodyLimits::default(),
            reply_to_refchange: ReplyTo::Pusher,
            reply_to_commit: ReplyTo::Author,
            announce_shortlog: false,
            refchange_showlog: false,
            max_commit_emails: None,
        }
    }

    /// Classify and account for a single-change push.
    fn account(
        repo: &MockRepo,
        env: &Environment,
        old: Option<&Oid>,
        new: Option<&Oid>,
        refname: &str,
    ) -> (Change, ChangeCommits) {
        let update = RawUpdate {
            old: old.cloned(),
            new: new.cloned(),
            refname: RefName::new(refname).unwrap(),
        };
        let mut change = Change::classify(repo, &update).unwrap().change;
        change.assign_recipients(&env.pools);
        let push = Push::new(repo, vec![change.clone()]).unwrap();
        let mut pool = AttributionPool::new(push.new_commits(repo).unwrap());
        let commits = ChangeCommits::account(repo, &push, &change, &mut pool).unwrap();
        (change, commits)
    }

    fn header<'l>(lines: &'l [String], name: &str) -> Option<&'l str> {
        let prefix = format!("{}: ", name);
        lines
            .iter()
            .take_while(|line| !line.is_empty())
            .find_map(|line| line.strip_prefix(prefix.as_str()))
    }

    fn has_line(lines: &[String], wanted: &str) -> bool {
        lines.iter().any(|line| line == wanted)
    }

    mod table {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn every_combination_has_an_entry() {
            for variant in [
                ChangeVariant::Branch,
                ChangeVariant::AnnotatedTag,
                ChangeVariant::LightweightTag,
                ChangeVariant::Other,
            ] {
                let deletes = summary_steps(variant, ChangeKind::Delete);
                assert!(!deletes.is_empty(), "{variant} delete has no summary");
            }
            assert!(summary_steps(ChangeVariant::Branch, ChangeKind::Update).is_empty());
            assert_eq!(
                summary_steps(ChangeVariant::AnnotatedTag, ChangeKind::Create).last(),
                Some(&SummaryStep::DescribeTag)
            );
        }
    }

    mod branches {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn fast_forward_update() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Add frobnicator", &[a.clone()]);
            let c = repo.commit("Fix frobnicator", &[b.clone()]);
            repo.set_ref("refs/heads/main", &c);
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&a), Some(&c), "refs/heads/main");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();

            assert_eq!(
                header(&lines, "Subject"),
                Some(format!("[widgets] branch main updated ({} -> {})", a.short(7), c.short(7)).as_str())
            );
            assert_eq!(header(&lines, "To"), Some("refs@example.com"));
            assert_eq!(header(&lines, "Reply-To"), Some("alice@example.com"));
            assert_eq!(header(&lines, "Message-ID"), Some(change.msgid.as_str()));
            assert!(has_line(&lines, &format!("      from  {}   Initial", a.short(7))));
            assert!(has_line(&lines, &format!("       new  {}   Add frobnicator", b.short(7))));
            assert!(has_line(&lines, &format!("       new  {}   Fix frobnicator", c.short(7))));
            assert!(lines.iter().any(|l| l.starts_with("The 2 revisions listed above")));
            assert!(has_line(&lines, "Summary of changes:"));
            assert_eq!(lines.last().unwrap(), "admin@example.com.");
        }

        #[test]
        fn create_lists_new_commits() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Topic work", &[a.clone()]);
            repo.set_ref("refs/heads/main", &a);
            repo.set_ref("refs/heads/topic", &b);
            let env = env();
            let (change, commits) = account(&repo, &env, None, Some(&b), "refs/heads/topic");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();

            assert_eq!(
                header(&lines, "Subject"),
                Some(format!("[widgets] branch topic created (now {})", b.short(7)).as_str())
            );
            assert!(has_line(&lines, &format!("        at  {}   Topic work", b.short(7))));
            assert!(has_line(&lines, "This branch includes the following new commits:"));
            assert!(has_line(&lines, &format!("       new  {}   Topic work", b.short(7))));
            assert!(!lines.iter().any(|l| l.contains("Initial")));
        }

        #[test]
        fn create_without_new_commits() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            repo.set_ref("refs/heads/main", &a);
            repo.set_ref("refs/heads/copy", &a);
            let env = env();
            let (change, commits) = account(&repo, &env, None, Some(&a), "refs/heads/copy");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(has_line(&lines, "No new revisions were added by this update."));
        }

        #[test]
        fn forced_update_marks_discards_and_omits() {
            let mut repo = MockRepo::new();
            let base = repo.commit("Base", &[]);
            let kept = repo.commit("Kept elsewhere", &[base.clone()]);
            let lost = repo.commit("Lost", &[kept.clone()]);
            let fresh = repo.commit("Fresh", &[base.clone()]);
            repo.set_ref("refs/heads/main", &fresh);
            repo.set_ref("refs/heads/backup", &kept);
            let env = env();
            let (change, commits) =
                account(&repo, &env, Some(&lost), Some(&fresh), "refs/heads/main");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();

            assert!(has_line(&lines, &format!("  discards  {}   Lost", lost.short(7))));
            assert!(has_line(&lines, &format!("     omits  {}   Kept elsewhere", kept.short(7))));
            assert!(has_line(&lines, &format!("       new  {}   Fresh", fresh.short(7))));
            assert!(has_line(&lines, "This update added new revisions after undoing existing revisions."));
        }

        #[test]
        fn rewind_only() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Keep", &[]);
            let b = repo.commit("Drop", &[a.clone()]);
            repo.set_ref("refs/heads/main", &a);
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&b), Some(&a), "refs/heads/main");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(has_line(&lines, &format!("  discards  {}   Drop", b.short(7))));
            assert!(lines.iter().any(|l| l.starts_with("This update removed existing revisions")));
            assert!(has_line(&lines, "No new revisions were added by this update."));
        }

        #[test]
        fn delete_lists_discarded_commits() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Doomed one", &[a.clone()]);
            let c = repo.commit("Doomed two", &[b.clone()]);
            repo.set_ref("refs/heads/main", &a);
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&c), None, "refs/heads/topic");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert_eq!(
                header(&lines, "Subject"),
                Some(format!("[widgets] branch topic deleted (was {})", c.short(7)).as_str())
            );
            assert!(has_line(&lines, &format!("       was  {}   Doomed two", c.short(7))));
            let discards: Vec<&String> = lines.iter().filter(|l| l.contains("discards  ")).collect();
            assert_eq!(
                discards,
                vec![
                    &format!("  discards  {}   Doomed two", c.short(7)),
                    &format!("  discards  {}   Doomed one", b.short(7)),
                ]
            );
        }

        #[test]
        fn delete_of_shared_history() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            repo.set_ref("refs/heads/main", &a);
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&a), None, "refs/heads/topic");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(lines
                .iter()
                .any(|l| l.starts_with("The revisions that were on this branch are still contained")));
        }

        #[test]
        fn showlog_appends_detailed_log() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit("Logged", &[a.clone()]);
            repo.set_ref("refs/heads/main", &b);
            let env = Environment {
                refchange_showlog: true,
                ..env()
            };
            let (change, commits) = account(&repo, &env, Some(&a), Some(&b), "refs/heads/main");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(has_line(&lines, "Detailed log of new commits:"));
            assert!(has_line(&lines, &format!("commit {}", b)));
            assert!(has_line(&lines, "    Logged"));
        }
    }

    mod tags {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn annotated_tag_create() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let old_tag = repo.tag_object("v1.0", &a, "one\n");
            repo.set_ref("refs/tags/v1.0", &old_tag);
            let b = repo.commit_by("Release work", &[a.clone()], "Bob", "bob@example.com");
            repo.set_ref("refs/heads/main", &b);
            let tag = repo.tag_object("v1.1", &b, "Release 1.1\n\nNotes.\n");
            repo.set_ref("refs/tags/v1.1", &tag);
            let env = Environment {
                announce_shortlog: true,
                ..env()
            };
            let (change, commits) = account(&repo, &env, None, Some(&tag), "refs/tags/v1.1");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();

            assert_eq!(header(&lines, "To"), Some("announce@example.com"));
            assert_eq!(
                header(&lines, "Subject"),
                Some(format!("[widgets] annotated tag v1.1 created (now {})", tag.short(7)).as_str())
            );
            assert!(has_line(&lines, &format!("        at  {}   (tag)", tag.short(7))));
            assert!(has_line(&lines, &format!("   tagging  {}   (commit)", b.short(7))));
            assert!(has_line(&lines, "  replaces  v1.0"));
            assert!(has_line(&lines, " tagged by  Tag Ger"));
            assert!(has_line(&lines, "Release 1.1"));
            assert!(has_line(&lines, "Bob (1):"));
            assert!(has_line(&lines, "      Release work"));
            assert!(has_line(&lines, template::LOGEND));
        }

        #[test]
        fn tag_of_blob_reports_length() {
            let mut repo = MockRepo::new();
            let blob = repo.blob(1234);
            let tag = repo.tag_object("key", &blob, "public key\n");
            repo.set_ref("refs/tags/key", &tag);
            let env = env();
            let (change, commits) = account(&repo, &env, None, Some(&tag), "refs/tags/key");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(has_line(&lines, "    length  1234 bytes"));
            assert!(lines.iter().any(|l| l.starts_with("This is an unusual reference change")));
        }

        #[test]
        fn lightweight_tag_delete() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            repo.set_ref("refs/heads/main", &a);
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&a), None, "refs/tags/v0");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(has_line(&lines, "*** WARNING: tag v0 was deleted! ***"));
            assert!(has_line(&lines, &format!("       was  {}   Initial", a.short(7))));
        }

        #[test]
        fn annotated_tag_delete() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            repo.set_ref("refs/heads/main", &a);
            let tag = repo.tag_object("v1", &a, "one\n");
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&tag), None, "refs/tags/v1");

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .change_message(&change, &commits)
                .unwrap();
            assert!(has_line(&lines, &format!("   tag was  {}", tag.short(7))));
        }
    }

    mod revisions {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn revision_message_threads_under_change() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit_by("Add widget", &[a.clone()], "Bob", "bob@example.com");
            repo.set_ref("refs/heads/main", &b);
            let env = env();
            let (change, commits) = account(&repo, &env, Some(&a), Some(&b), "refs/heads/main");
            let revisions = commits.revisions(&change, &env.pools.revision);

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .revision_message(&revisions[0])
                .unwrap();

            assert_eq!(header(&lines, "Subject"), Some("[widgets] 01/01: Add widget"));
            assert_eq!(header(&lines, "To"), Some("commits@example.com"));
            assert_eq!(header(&lines, "In-Reply-To"), Some(change.msgid.as_str()));
            assert_eq!(header(&lines, "Reply-To"), Some("Bob <bob@example.com>"));
            assert_eq!(header(&lines, "X-Git-Rev"), Some(b.as_str()));
            assert!(has_line(&lines, &format!("commit {}", b)));
            assert!(has_line(&lines, "Author: Bob <bob@example.com>"));
            assert!(has_line(&lines, "    Add widget"));
            assert!(has_line(&lines, "---"));
        }

        #[test]
        fn missing_author_email_drops_reply_to() {
            let mut repo = MockRepo::new();
            let a = repo.commit_by("Anonymous", &[], "Nobody", "");
            repo.set_ref("refs/heads/main", &a);
            let env = env();
            let (change, commits) = account(&repo, &env, None, Some(&a), "refs/heads/main");
            let revisions = commits.revisions(&change, &env.pools.revision);

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .revision_message(&revisions[0])
                .unwrap();
            assert_eq!(header(&lines, "Reply-To"), None);
            assert_eq!(header(&lines, "Subject"), Some("[widgets] 01/01: Anonymous"));
        }

        #[test]
        fn body_filter_leaves_header_and_footer_alone() {
            let mut repo = MockRepo::new();
            let a = repo.commit("Initial", &[]);
            let b = repo.commit(&"x".repeat(300), &[a.clone()]);
            repo.set_ref("refs/heads/main", &b);
            let env = Environment {
                limits: BodyLimits {
                    max_lines: Some(2),
                    max_line_length: Some(40),
                    strict_utf8: true,
                },
                ..env()
            };
            let (change, commits) = account(&repo, &env, Some(&a), Some(&b), "refs/heads/main");
            let revisions = commits.revisions(&change, &env.pools.revision);

            let lines = Composer::new(&repo, &env, Verbosity::Quiet)
                .revision_message(&revisions[0])
                .unwrap();
            // The subject header carries the full commit subject
            assert!(header(&lines, "Subject").unwrap().len() > 300);
            assert!(lines.iter().any(|l| l.ends_with("lines suppressed ...")));
            assert_eq!(lines.last().unwrap(), "admin@example.com.");
        }
    }
}

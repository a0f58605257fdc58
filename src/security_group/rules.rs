use std::collections::{BTreeSet, HashMap, HashSet};

use crate::api::{self, fetch_all, CoreApi, SecurityGroupRule, SecurityGroupRuleArguments};

pub const INBOUND: &str = "inbound";
pub const OUTBOUND: &str = "outbound";

/// Declarative security group rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub id: Option<String>,
    pub direction: String,
    pub protocol: String,
    pub ports: String,
    pub targets: Vec<String>,
    pub notes: String,
}

impl Rule {
    /// Server id, if the rule has been persisted
    pub fn key(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Field comparison, ignoring the order of targets
    pub fn same_fields(&self, other: &Rule) -> bool {
        self.protocol == other.protocol
            && self.ports == other.ports
            && self.notes == other.notes
            && self.targets.iter().collect::<BTreeSet<_>>()
                == other.targets.iter().collect::<BTreeSet<_>>()
    }

    pub fn arguments(&self, with_direction: bool) -> SecurityGroupRuleArguments {
        SecurityGroupRuleArguments {
            direction: with_direction.then(|| self.direction.clone()),
            protocol: Some(self.protocol.clone()),
            ports: Some(self.ports.clone()),
            targets: Some(self.targets.clone()),
            notes: Some(self.notes.clone()),
        }
    }
}

impl From<SecurityGroupRule> for Rule {
    fn from(rule: SecurityGroupRule) -> Self {
        Self {
            id: Some(rule.id),
            direction: rule.direction,
            protocol: rule.protocol,
            ports: rule.ports.unwrap_or_default(),
            targets: rule.targets,
            notes: rule.notes.unwrap_or_default(),
        }
    }
}

/// Operations needed to go from one rule set to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDiff {
    pub create: Vec<Rule>,
    pub update: Vec<Rule>,
    pub delete: Vec<Rule>,
}

impl RuleDiff {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Compute the rules to create, update and delete to turn `old` into `new`
///
/// Rules are matched by id. New rules without id, or with an id unknown to
/// `old`, are created. Matched rules whose fields differ are updated. Rules of
/// `old` whose id is absent from `new` are deleted.
pub fn diff_rules(old: &[Rule], new: &[Rule]) -> RuleDiff {
    let old_by_id = old
        .iter()
        .filter_map(|rule| Some((rule.key()?, rule)))
        .collect::<HashMap<_, _>>();

    let mut diff = RuleDiff::default();
    let mut matched = HashSet::new();

    for rule in new {
        match rule.key() {
            Some(id) if !matched.contains(id) && old_by_id.contains_key(id) => {
                matched.insert(id);
                if !old_by_id[id].same_fields(rule) {
                    diff.update.push(rule.clone());
                }
            }
            _ => diff.create.push(Rule {
                id: None,
                ..rule.clone()
            }),
        }
    }

    diff.delete = old
        .iter()
        .filter(|rule| matches!(rule.key(), Some(id) if !matched.contains(id)))
        .cloned()
        .collect();

    diff
}

/// `rules` ordered like `known`, unmatched rules last in server order
///
/// A known rule with an id matches the rule with that id. A known rule without
/// id matches the first rule with the same fields and an id unknown to `known`.
pub fn order_like(known: &[Rule], rules: Vec<Rule>) -> Vec<Rule> {
    let known_ids = known.iter().filter_map(Rule::key).collect::<HashSet<_>>();
    let mut remaining = rules.into_iter().map(Some).collect::<Vec<_>>();
    let mut ordered = Vec::with_capacity(remaining.len());

    for rule in known {
        let position = remaining.iter().position(|candidate| match (candidate, rule.key()) {
            (Some(candidate), Some(id)) => candidate.key() == Some(id),
            (Some(candidate), None) => {
                !candidate.key().is_some_and(|id| known_ids.contains(id))
                    && candidate.same_fields(rule)
            }
            (None, _) => false,
        });
        if let Some(rule) = position.and_then(|i| remaining[i].take()) {
            ordered.push(rule);
        }
    }

    ordered.extend(remaining.into_iter().flatten());
    ordered
}

/// Inbound and outbound rules
pub fn split_directions(rules: Vec<Rule>) -> (Vec<Rule>, Vec<Rule>) {
    rules
        .into_iter()
        .partition(|rule| !rule.direction.eq_ignore_ascii_case(OUTBOUND))
}

/// Every rule of a security group
pub async fn fetch_rules(client: &dyn CoreApi, security_group_id: &str) -> api::Result<Vec<Rule>> {
    let rules = fetch_all(|page| client.list_security_group_rules(security_group_id, page)).await?;
    Ok(rules.into_iter().map(Rule::from).collect())
}

/// Apply `diff` to the rules of a security group: deletions first, then updates and creations
pub async fn apply_diff(
    client: &dyn CoreApi,
    security_group_id: &str,
    diff: &RuleDiff,
) -> api::Result<()> {
    for rule in &diff.delete {
        if let Some(id) = rule.key() {
            api::optional(client.delete_security_group_rule(id).await)?;
        }
    }
    for rule in &diff.update {
        if let Some(id) = rule.key() {
            client
                .update_security_group_rule(id, &rule.arguments(false))
                .await?;
        }
    }
    for rule in &diff.create {
        client
            .create_security_group_rule(security_group_id, &rule.arguments(true))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSH_ID: &str = "sgr_rdSgXlEJ1sL6XmR4";
    const DNS_ID: &str = "sgr_sO2uWbkDeOYep5K4";
    const HTTP_ID: &str = "sgr_v3lf3DOIJ3EDPCGg";

    fn rule(id: Option<&str>, ports: &str, targets: &[&str], notes: &str) -> Rule {
        Rule {
            id: id.map(String::from),
            direction: String::from("inbound"),
            protocol: String::from("TCP"),
            ports: String::from(ports),
            targets: targets.iter().map(|t| String::from(*t)).collect(),
            notes: String::from(notes),
        }
    }

    fn ssh(version: u8) -> Rule {
        match version {
            0 => rule(None, "22", &["all:ipv4"], "SSH"),
            1 => rule(Some(SSH_ID), "22", &["all:ipv4"], "SSH"),
            _ => rule(Some(SSH_ID), "22,722", &["all:ipv4", "all:ipv6"], "SSH"),
        }
    }

    fn dns(version: u8) -> Rule {
        match version {
            0 => rule(None, "53", &["1.1.1.1", "1.0.0.1"], "Cloudflare DNS"),
            1 => rule(Some(DNS_ID), "53", &["1.1.1.1", "1.0.0.1"], "Cloudflare DNS"),
            _ => rule(
                Some(DNS_ID),
                "53",
                &["1.1.1.1", "1.0.0.1", "8.8.8.8", "8.8.4.4"],
                "Public DNS",
            ),
        }
    }

    fn http(version: u8) -> Rule {
        match version {
            0 => rule(None, "80,443", &["all:ipv4"], "HTTP/HTTPS"),
            1 => rule(Some(HTTP_ID), "80,443", &["all:ipv4"], "HTTP/HTTPS"),
            _ => rule(
                Some(HTTP_ID),
                "80,443",
                &["all:ipv4", "all:ipv6"],
                "HTTP & HTTPS",
            ),
        }
    }

    fn sorted(mut rules: Vec<Rule>) -> Vec<Rule> {
        rules.sort_by(|a, b| (&a.ports, &a.notes).cmp(&(&b.ports, &b.notes)));
        rules
    }

    fn assert_diff(old: &[Rule], new: &[Rule], create: &[Rule], update: &[Rule], delete: &[Rule]) {
        let diff = diff_rules(old, new);
        assert_eq!(sorted(diff.create), sorted(create.to_vec()), "create");
        assert_eq!(sorted(diff.update), sorted(update.to_vec()), "update");
        assert_eq!(sorted(diff.delete), sorted(delete.to_vec()), "delete");
    }

    #[test]
    fn create_first_rule() {
        assert_diff(&[], &[ssh(0)], &[ssh(0)], &[], &[]);
    }

    #[test]
    fn create_many_rules() {
        assert_diff(&[], &[ssh(0), dns(0)], &[ssh(0), dns(0)], &[], &[]);
    }

    #[test]
    fn add_one_rule() {
        assert_diff(
            &[ssh(1), dns(1)],
            &[ssh(1), http(0), dns(1)],
            &[http(0)],
            &[],
            &[],
        );
    }

    #[test]
    fn add_many_rules() {
        assert_diff(
            &[ssh(1)],
            &[dns(0), ssh(1), http(0)],
            &[dns(0), http(0)],
            &[],
            &[],
        );
    }

    #[test]
    fn update_one_rule() {
        assert_diff(&[ssh(1), dns(1)], &[ssh(2), dns(1)], &[], &[ssh(2)], &[]);
    }

    #[test]
    fn update_many_rules() {
        assert_diff(
            &[ssh(1), dns(1), http(1)],
            &[ssh(1), dns(2), http(2)],
            &[],
            &[dns(2), http(2)],
            &[],
        );
    }

    #[test]
    fn delete_one_rule() {
        assert_diff(&[ssh(1), dns(1)], &[ssh(1)], &[], &[], &[dns(1)]);
    }

    #[test]
    fn delete_many_rules() {
        assert_diff(
            &[ssh(1), dns(1), http(1)],
            &[dns(1)],
            &[],
            &[],
            &[ssh(1), http(1)],
        );
    }

    #[test]
    fn create_update_delete() {
        assert_diff(
            &[ssh(1), dns(1)],
            &[dns(2), http(0)],
            &[http(0)],
            &[dns(2)],
            &[ssh(1)],
        );
    }

    #[test]
    fn target_order_is_ignored() {
        let mut reordered = dns(1);
        reordered.targets.reverse();
        assert!(dns(1).same_fields(&reordered));
        assert!(diff_rules(&[dns(1)], &[reordered]).is_empty());
    }

    #[test]
    fn unknown_id_is_created() {
        let diff = diff_rules(&[ssh(1)], &[ssh(1), http(1)]);
        assert_eq!(diff.create, vec![http(0)]);
        assert!(diff.update.is_empty());
        assert!(diff.delete.is_empty());
    }

    #[test]
    fn server_rules_follow_known_order() {
        let server = vec![http(1), ssh(1), rule(Some("sgr_new"), "25", &[], ""), dns(1)];
        let ordered = order_like(&[dns(1), ssh(1), http(1)], server);
        let ids = ordered
            .iter()
            .map(|rule| rule.key().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![DNS_ID, SSH_ID, HTTP_ID, "sgr_new"]);
    }

    #[test]
    fn new_rules_match_by_fields() {
        let mut created = vec![http(1), ssh(1)];
        created[0].id = Some(String::from("sgr_10"));
        created[1].id = Some(String::from("sgr_9"));
        let ordered = order_like(&[ssh(0), http(0)], created);
        assert_eq!(ordered[0].key(), Some("sgr_9"));
        assert_eq!(ordered[1].key(), Some("sgr_10"));
    }

    #[test]
    fn split_by_direction() {
        let mut outbound = http(1);
        outbound.direction = String::from(OUTBOUND);
        let (inbound, outbound) = split_directions(vec![ssh(1), outbound, dns(1)]);
        assert_eq!(inbound, vec![ssh(1), dns(1)]);
        assert_eq!(outbound.len(), 1);
    }

    #[test]
    fn empty_id_is_not_a_match() {
        let mut blank = ssh(0);
        blank.id = Some(String::new());
        let diff = diff_rules(&[blank.clone()], &[blank]);
        assert_eq!(diff.create.len(), 1);
        assert!(diff.delete.is_empty());
    }
}

//! Warning and recommendation rules for one candidate

use crate::models::{ContactChannel, EmailAnalysis, EmailType, FreelancerProfile};
use crate::scoring::age_days;
use chrono::{DateTime, Utc};

pub struct RuleInput<'a> {
    pub name: &'a str,
    pub email: &'a EmailAnalysis,
    pub channels: &'a [ContactChannel],
    pub freelancer: &'a FreelancerProfile,
    pub freshness: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    pub stale_after_days: i64,
}

#[derive(Debug, Default, PartialEq)]
pub struct RuleFindings {
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

pub fn evaluate(input: &RuleInput<'_>) -> RuleFindings {
    let mut findings = RuleFindings::default();

    match input.email.email_type {
        Some(EmailType::Alias) | Some(EmailType::Role) => {
            let kind = if input.email.email_type == Some(EmailType::Role) {
                "role"
            } else {
                "alias"
            };
            findings.warnings.push(format!(
                "Only a shared {} mailbox was found for {}",
                kind, input.name
            ));
            findings
                .recommendations
                .push(format!("Find a personal contact channel for {}", input.name));
        }
        Some(EmailType::Personal) | None => {}
    }

    if !input.channels.iter().any(|c| c.policy_compliant) {
        findings
            .warnings
            .push("No policy-compliant contact channel".to_string());
    }

    if input.freelancer.is_freelancer {
        if let Some(primary) = &input.freelancer.primary_outlet {
            findings.recommendations.push(format!(
                "Consolidate authorship for {} under {} ({} outlets)",
                input.name,
                primary,
                input.freelancer.outlets.len()
            ));
        }
    }

    match input.freshness {
        Some(published) => {
            let age = age_days(published, input.now);
            if age > input.stale_after_days {
                findings
                    .warnings
                    .push(format!("Latest byline is {} days old", age));
            }
        }
        None => findings
            .warnings
            .push("Publication date missing; freshness assumed".to_string()),
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelType;
    use chrono::Duration;

    fn base<'a>(
        email: &'a EmailAnalysis,
        channels: &'a [ContactChannel],
        freelancer: &'a FreelancerProfile,
        freshness: Option<DateTime<Utc>>,
    ) -> RuleInput<'a> {
        RuleInput {
            name: "Jane Doe",
            email,
            channels,
            freelancer,
            freshness,
            now: Utc::now(),
            stale_after_days: 180,
        }
    }

    #[test]
    fn clean_candidate_has_no_findings() {
        let email = EmailAnalysis {
            address: Some("jane.doe@paper.com".to_string()),
            email_type: Some(EmailType::Personal),
        };
        let channels = vec![ContactChannel {
            channel_type: ChannelType::Email,
            value: "jane.doe@paper.com".to_string(),
            source_url: "https://paper.com/a".to_string(),
            confidence: 0.9,
            policy_compliant: true,
        }];
        let freelancer = FreelancerProfile::default();

        let findings = evaluate(&base(&email, &channels, &freelancer, Some(Utc::now())));
        assert_eq!(findings, RuleFindings::default());
    }

    #[test]
    fn role_mailbox_and_stale_byline() {
        let email = EmailAnalysis {
            address: Some("tips@paper.com".to_string()),
            email_type: Some(EmailType::Role),
        };
        let freelancer = FreelancerProfile::default();
        let old = Utc::now() - Duration::days(400);

        let findings = evaluate(&base(&email, &[], &freelancer, Some(old)));

        assert_eq!(findings.warnings.len(), 3);
        assert!(findings.warnings[0].contains("role mailbox"));
        assert!(findings.warnings[2].contains("400 days"));
        assert_eq!(findings.recommendations.len(), 1);
    }

    #[test]
    fn freelancer_gets_consolidation_recommendation() {
        let email = EmailAnalysis::default();
        let freelancer = FreelancerProfile {
            is_freelancer: true,
            outlets: vec!["a.com".to_string(), "b.com".to_string()],
            primary_outlet: Some("a.com".to_string()),
        };

        let findings = evaluate(&base(&email, &[], &freelancer, None));

        assert!(findings.recommendations[0].contains("under a.com (2 outlets)"));
        assert!(findings
            .warnings
            .iter()
            .any(|w| w.contains("Publication date missing")));
    }
}

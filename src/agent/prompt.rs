//! System instruction composition

use crate::models::{AgentProfile, ContextNote, NoteCategory};

const BOOKKEEPING_POLICY: &str = "\
You are the bookkeeping assistant for a real-estate brokerage back office.
Categorize transactions against the chart of accounts and draft balanced
double-entry journal entries for human review.

- Look accounts up with search_accounts before using an account code.
- Every journal entry must balance: total debits equal total credits.
- Drafts are never posted; say so when you present one.
- Only use remember_context when the user explicitly asks you to remember something.";

const ANALYSIS_POLICY: &str = "\
You are the financial analysis assistant for a real-estate brokerage back office.
Answer questions about account balances and activity using the tools provided.

- Quote figures from account_balances rather than estimating.
- Name the accounts you used so the answer can be checked.
- You cannot draft or post journal entries; refer those requests to bookkeeping.
- Only use remember_context when the user explicitly asks you to remember something.";

fn policy_text(profile: AgentProfile) -> &'static str {
    match profile {
        AgentProfile::Bookkeeping => BOOKKEEPING_POLICY,
        AgentProfile::FinancialAnalysis => ANALYSIS_POLICY,
    }
}

fn category_heading(category: NoteCategory) -> &'static str {
    match category {
        NoteCategory::Preference => "Preferences",
        NoteCategory::AccountMapping => "Account mappings",
        NoteCategory::Vendor => "Vendors",
        NoteCategory::Correction => "Corrections",
        NoteCategory::General => "General",
    }
}

/// Policy text for the profile followed by remembered notes grouped by category
pub fn build_system_instruction(profile: AgentProfile, notes: &[ContextNote]) -> String {
    let mut out = String::from(policy_text(profile));

    if notes.is_empty() {
        return out;
    }

    out.push_str("\n\n## Remembered context\n");
    out.push_str("Facts the team asked you to remember. Apply them unless the user says otherwise.\n");

    for category in NoteCategory::ALL {
        let mut in_category = notes.iter().filter(|n| n.category == category).peekable();
        if in_category.peek().is_none() {
            continue;
        }

        out.push_str(&format!("\n### {}\n", category_heading(category)));
        for note in in_category {
            match &note.linked_entity {
                Some(entity) => out.push_str(&format!(
                    "- {} ({}: {})\n",
                    note.content, entity.kind, entity.id
                )),
                None => out.push_str(&format!("- {}\n", note.content)),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkedEntity;
    use chrono::Utc;
    use uuid::Uuid;

    fn note(category: NoteCategory, content: &str, linked: Option<LinkedEntity>) -> ContextNote {
        ContextNote {
            note_id: Uuid::new_v4(),
            category,
            content: content.to_string(),
            linked_entity: linked,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_notes_is_policy_only() {
        let text = build_system_instruction(AgentProfile::FinancialAnalysis, &[]);
        assert!(text.contains("financial analysis assistant"));
        assert!(!text.contains("Remembered context"));
    }

    #[test]
    fn test_notes_grouped_by_category() {
        let notes = vec![
            note(NoteCategory::Vendor, "Homesnap is advertising", None),
            note(
                NoteCategory::Preference,
                "Use whole dollars in summaries",
                Some(LinkedEntity {
                    kind: "agent".into(),
                    id: "jdoe".into(),
                }),
            ),
        ];

        let text = build_system_instruction(AgentProfile::Bookkeeping, &notes);
        let prefs = text.find("### Preferences").unwrap();
        let vendors = text.find("### Vendors").unwrap();

        assert!(prefs < vendors);
        assert!(text.contains("- Use whole dollars in summaries (agent: jdoe)"));
        assert!(text.contains("- Homesnap is advertising"));
        assert!(!text.contains("### Corrections"));
    }
}

use crate::account::UserAccount;
use crate::config::CostTable;
use crate::error::PolicyError;
use crate::request::GenerationRequest;

/// Credits charged for a request. Depends only on the request's shape.
#[must_use]
pub fn cost_of(request: Option<&GenerationRequest>, costs: &CostTable) -> i64 {
    let Some(request) = request else {
        return 0;
    };
    match request {
        GenerationRequest::Design { .. } => costs.design,
        GenerationRequest::Group { .. } if request.has_prompt() => costs.group_custom,
        GenerationRequest::Group { .. } => costs.group_style,
        GenerationRequest::Image { .. } if request.has_prompt() => costs.custom_image,
        GenerationRequest::Image { .. } => costs.style_image,
        GenerationRequest::Video { .. } => costs.video,
    }
}

#[must_use]
pub fn can_afford(account: &UserAccount, request: &GenerationRequest, costs: &CostTable) -> bool {
    account.credits >= cost_of(Some(request), costs)
}

/// The gate in front of `generating`: the cost to charge, or why the request may not run.
pub fn check_affordable(
    account: &UserAccount,
    request: &GenerationRequest,
    costs: &CostTable,
) -> Result<i64, PolicyError> {
    let required = cost_of(Some(request), costs);
    if account.credits < required {
        return Err(PolicyError::InsufficientCredits {
            required,
            current: account.credits,
        });
    }
    Ok(required)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;
    use crate::account::Email;
    use crate::identity::VerifiedIdentity;
    use crate::request::{file, AspectRatio, Direction, SourceFile, VideoKind};

    fn account(credits: i64) -> UserAccount {
        let identity = VerifiedIdentity {
            email: Email::parse("a@b.co").unwrap(),
            name: None,
            picture: None,
        };
        UserAccount::new(&identity, credits, NaiveDate::default())
    }

    fn image(direction: Option<Direction>) -> GenerationRequest {
        GenerationRequest::Image {
            files: vec![file("a.jpg")],
            direction,
            keep_likeness: true,
            aspect_ratio: AspectRatio::Square,
        }
    }

    fn group(direction: Option<Direction>) -> GenerationRequest {
        GenerationRequest::Group {
            files: vec![file("a.jpg"), file("b.jpg")],
            direction,
            keep_likeness: true,
            aspect_ratio: AspectRatio::Square,
        }
    }

    fn style() -> Option<Direction> {
        Some(Direction::Style {
            style_id: "film_noir".into(),
        })
    }

    fn prompt() -> Option<Direction> {
        Some(Direction::prompt("astronaut", None))
    }

    #[test]
    fn cost_table_applies_per_kind() {
        let costs = CostTable::default();
        assert_eq!(cost_of(None, &costs), 0);
        assert_eq!(cost_of(Some(&image(style())), &costs), 2);
        assert_eq!(cost_of(Some(&image(prompt())), &costs), 5);
        assert_eq!(cost_of(Some(&group(style())), &costs), 4);
        assert_eq!(cost_of(Some(&group(prompt())), &costs), 6);
        let design = GenerationRequest::Design {
            text_content: BTreeMap::new(),
            style_description: String::new(),
            logo: None,
        };
        assert_eq!(cost_of(Some(&design), &costs), 8);
        let video = GenerationRequest::Video {
            kind: VideoKind::Scene,
            files: vec![],
            prompt: "waves".into(),
        };
        assert_eq!(cost_of(Some(&video), &costs), 25);
    }

    #[test]
    fn one_credit_cannot_buy_a_styled_image() {
        let costs = CostTable::default();
        let err = check_affordable(&account(1), &image(style()), &costs).unwrap_err();
        assert_eq!(
            err,
            PolicyError::InsufficientCredits {
                required: 2,
                current: 1
            }
        );
        assert_eq!(check_affordable(&account(2), &image(style()), &costs), Ok(2));
    }

    fn arb_direction() -> impl Strategy<Value = Option<Direction>> {
        prop_oneof![
            Just(None),
            "[a-z_]{1,12}".prop_map(|style_id| Some(Direction::Style { style_id })),
            ("[ -~]{0,24}", proptest::option::of("[ -~]{0,8}"))
                .prop_map(|(text, negative)| Some(Direction::Prompt { text, negative })),
        ]
    }

    fn arb_files() -> impl Strategy<Value = Vec<SourceFile>> {
        proptest::collection::vec("[a-z]{1,8}".prop_map(|n| file(&n)), 0..4)
    }

    fn arb_request() -> impl Strategy<Value = GenerationRequest> {
        prop_oneof![
            (arb_files(), arb_direction(), any::<bool>()).prop_map(|(files, direction, keep)| {
                GenerationRequest::Image {
                    files,
                    direction,
                    keep_likeness: keep,
                    aspect_ratio: AspectRatio::Square,
                }
            }),
            (arb_files(), arb_direction(), any::<bool>()).prop_map(|(files, direction, keep)| {
                GenerationRequest::Group {
                    files,
                    direction,
                    keep_likeness: keep,
                    aspect_ratio: AspectRatio::Portrait,
                }
            }),
            "[ -~]{0,16}".prop_map(|style_description| GenerationRequest::Design {
                text_content: BTreeMap::new(),
                style_description,
                logo: None,
            }),
            (arb_files(), "[ -~]{0,16}").prop_map(|(files, prompt)| GenerationRequest::Video {
                kind: VideoKind::Animate,
                files,
                prompt,
            }),
        ]
    }

    proptest! {
        #[test]
        fn cost_is_never_negative(request in arb_request()) {
            prop_assert!(cost_of(Some(&request), &CostTable::default()) >= 0);
        }

        #[test]
        fn cost_ignores_files_and_flags(request in arb_request(), files in arb_files()) {
            let costs = CostTable::default();
            let swapped = match request.clone() {
                GenerationRequest::Image { direction, keep_likeness, .. } => GenerationRequest::Image {
                    files: files.clone(),
                    direction,
                    keep_likeness: !keep_likeness,
                    aspect_ratio: AspectRatio::Landscape,
                },
                GenerationRequest::Group { direction, keep_likeness, .. } => GenerationRequest::Group {
                    files: files.clone(),
                    direction,
                    keep_likeness: !keep_likeness,
                    aspect_ratio: AspectRatio::Landscape,
                },
                other => other,
            };
            prop_assert_eq!(cost_of(Some(&request), &costs), cost_of(Some(&swapped), &costs));
        }

        #[test]
        fn affordability_matches_balance(credits in -10i64..40, request in arb_request()) {
            let costs = CostTable::default();
            let account = account(credits);
            let cost = cost_of(Some(&request), &costs);
            prop_assert_eq!(can_afford(&account, &request, &costs), credits >= cost);
            prop_assert_eq!(check_affordable(&account, &request, &costs).is_ok(), credits >= cost);
        }
    }
}

use keyfold_access::{
    check_permission, AccessError, AuditAction, Directory, E2eeProfile, MemoryDirectory,
    Permission, Role, Target,
};
use keyfold_crypto::{
    derive_master_key_with, generate_vault_key, unwrap, wrap_for_member, wrap_for_owner,
    AvailableKeyMaterial, CryptoError, KdfParams, MemberKeyPair, Salt,
};
use pretty_assertions::assert_eq;

fn fast_params() -> KdfParams {
    KdfParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

fn initialized_principal(
    dir: &MemoryDirectory,
    secret: &str,
) -> (keyfold_types::PrincipalId, keyfold_crypto::DerivedKey, MemberKeyPair) {
    let id = dir.register_principal();
    let salt = Salt::random();
    let bundle = derive_master_key_with(secret, &salt, &fast_params()).unwrap();
    let keypair = MemberKeyPair::generate();

    dir.initialize_e2ee(
        id,
        E2eeProfile {
            salt,
            verifier: bundle.verifier,
            public_key: keypair.public_bytes(),
        },
    )
    .unwrap();

    (id, bundle.master_key, keypair)
}

#[test]
fn e2ee_initialization_is_rejected_twice() {
    let dir = MemoryDirectory::new();
    let (id, _master, keypair) = initialized_principal(&dir, "first secret");

    let salt = Salt::random();
    let bundle = derive_master_key_with("second secret", &salt, &fast_params()).unwrap();
    let err = dir
        .initialize_e2ee(
            id,
            E2eeProfile {
                salt,
                verifier: bundle.verifier,
                public_key: keypair.public_bytes(),
            },
        )
        .unwrap_err();

    assert!(matches!(err, AccessError::AlreadyInitialized));
}

#[test]
fn verifier_check_accepts_correct_secret_only() {
    let dir = MemoryDirectory::new();
    let (id, _master, _keys) = initialized_principal(&dir, "the real secret");

    let salt = dir.salt(id).unwrap();
    let good = derive_master_key_with("the real secret", &salt, &fast_params()).unwrap();
    let bad = derive_master_key_with("a wrong guess", &salt, &fast_params()).unwrap();

    assert!(dir.check_verifier(id, &good.verifier).unwrap());
    assert!(!dir.check_verifier(id, &bad.verifier).unwrap());
}

#[test]
fn salt_lookup_requires_initialization() {
    let dir = MemoryDirectory::new();
    let id = dir.register_principal();
    assert!(matches!(dir.salt(id), Err(AccessError::NotInitialized)));
}

#[test]
fn personal_vault_holds_exactly_the_owner_wrap() {
    let dir = MemoryDirectory::new();
    let (owner, master, _keys) = initialized_principal(&dir, "owner secret");

    let vault_key = generate_vault_key();
    let wrap = wrap_for_owner(&vault_key, &master).unwrap();
    let vault = dir.create_personal_vault(owner, wrap).unwrap();

    let stored = dir.personal_vault_wrap(vault).unwrap();
    let recovered = unwrap(&stored, AvailableKeyMaterial::MasterKey(&master)).unwrap();
    assert_eq!(recovered, vault_key);
}

#[test]
fn personal_vault_rejects_asymmetric_owner_wrap() {
    let dir = MemoryDirectory::new();
    let (owner, _master, keys) = initialized_principal(&dir, "owner secret");

    let vault_key = generate_vault_key();
    let wrap = wrap_for_member(&vault_key, &keys.public).unwrap();
    let err = dir.create_personal_vault(owner, wrap).unwrap_err();
    assert!(matches!(err, AccessError::InvalidWrapScheme));
}

#[test]
fn org_share_scenario_end_to_end() {
    let dir = MemoryDirectory::new();

    // Owner creates the org vault and wraps the vault key for themselves.
    let (owner, owner_master, _owner_keys) = initialized_principal(&dir, "owner secret");
    let vault_key = generate_vault_key();
    let owner_wrap = wrap_for_owner(&vault_key, &owner_master).unwrap();
    let (org, vault) = dir.create_org(owner, owner_wrap).unwrap();

    // Owner invites B and wraps the vault key to B's public key.
    let (member_b, _b_master, b_keys) = initialized_principal(&dir, "b secret");
    let b_public = keyfold_crypto::PublicKey::from(dir.public_key(member_b).unwrap());
    let b_wrap = wrap_for_member(&vault_key, &b_public).unwrap();
    let invitation = dir.invite(org, member_b, Role::Member).unwrap();
    dir.accept_invitation(invitation, b_wrap).unwrap();

    // Gate passes for B, then B unwraps with their private key.
    assert!(check_permission(&dir, member_b, Target::Vault(vault), Permission::Decrypt));
    let b_stored = dir.org_vault_wrap(vault, member_b).unwrap();
    let b_view = unwrap(&b_stored, AvailableKeyMaterial::PrivateKey(&b_keys.secret)).unwrap();
    assert_eq!(b_view, vault_key);

    // The owner still unwraps through their own symmetric wrap.
    let owner_stored = dir.org_vault_wrap(vault, owner).unwrap();
    let owner_view =
        unwrap(&owner_stored, AvailableKeyMaterial::MasterKey(&owner_master)).unwrap();
    assert_eq!(owner_view, vault_key);

    // The owner's master key is the wrong material for B's wrap.
    let err = unwrap(&b_stored, AvailableKeyMaterial::MasterKey(&owner_master)).unwrap_err();
    assert!(matches!(err, CryptoError::KeyMaterialMismatch { .. }));
}

#[test]
fn non_member_gets_no_org_wrap() {
    let dir = MemoryDirectory::new();
    let (owner, owner_master, _keys) = initialized_principal(&dir, "owner secret");
    let (stranger, _m, _k) = initialized_principal(&dir, "stranger secret");

    let vault_key = generate_vault_key();
    let owner_wrap = wrap_for_owner(&vault_key, &owner_master).unwrap();
    let (_org, vault) = dir.create_org(owner, owner_wrap).unwrap();

    let err = dir.org_vault_wrap(vault, stranger).unwrap_err();
    assert!(matches!(err, AccessError::WrapNotFound(_)));
}

#[test]
fn invitation_cannot_be_consumed_twice() {
    let dir = MemoryDirectory::new();
    let (owner, owner_master, _keys) = initialized_principal(&dir, "owner secret");
    let (member, _m, member_keys) = initialized_principal(&dir, "member secret");

    let vault_key = generate_vault_key();
    let owner_wrap = wrap_for_owner(&vault_key, &owner_master).unwrap();
    let (org, _vault) = dir.create_org(owner, owner_wrap).unwrap();

    let invitation = dir.invite(org, member, Role::Viewer).unwrap();
    let wrap = wrap_for_member(&vault_key, &member_keys.public).unwrap();
    dir.accept_invitation(invitation, wrap.clone()).unwrap();

    let err = dir.accept_invitation(invitation, wrap).unwrap_err();
    assert!(matches!(err, AccessError::InvitationConsumed(_)));

    // Exactly one acceptance in the audit log.
    let accepted: Vec<_> = dir
        .audit_log()
        .into_iter()
        .filter(|r| r.action == AuditAction::InvitationAccepted)
        .collect();
    assert_eq!(accepted.len(), 1);
}

#[test]
fn failed_acceptance_writes_nothing() {
    let dir = MemoryDirectory::new();
    let (owner, owner_master, _keys) = initialized_principal(&dir, "owner secret");
    let (member, _m, _member_keys) = initialized_principal(&dir, "member secret");

    let vault_key = generate_vault_key();
    let owner_wrap = wrap_for_owner(&vault_key, &owner_master).unwrap();
    let (org, _vault) = dir.create_org(owner, owner_wrap.clone()).unwrap();

    let invitation = dir.invite(org, member, Role::Member).unwrap();

    // A symmetric wrap is the wrong scheme for an invited member.
    let err = dir.accept_invitation(invitation, owner_wrap).unwrap_err();
    assert!(matches!(err, AccessError::InvalidWrapScheme));

    // Nothing happened: no membership, invitation still pending, no audit.
    assert!(dir.membership(org, member).unwrap().is_none());
    assert_eq!(
        dir.invitation(invitation).unwrap().status,
        keyfold_access::InvitationStatus::Pending
    );
    assert!(dir.audit_log().is_empty());
}

#[test]
fn role_change_keeps_the_wrap() {
    let dir = MemoryDirectory::new();
    let (owner, owner_master, _keys) = initialized_principal(&dir, "owner secret");
    let (member, _m, member_keys) = initialized_principal(&dir, "member secret");

    let vault_key = generate_vault_key();
    let owner_wrap = wrap_for_owner(&vault_key, &owner_master).unwrap();
    let (org, vault) = dir.create_org(owner, owner_wrap).unwrap();

    let invitation = dir.invite(org, member, Role::Viewer).unwrap();
    let wrap = wrap_for_member(&vault_key, &member_keys.public).unwrap();
    dir.accept_invitation(invitation, wrap).unwrap();

    // Promote to admin: permissions change, wrap does not.
    dir.set_role(org, member, Role::Admin).unwrap();
    assert!(check_permission(&dir, member, Target::Vault(vault), Permission::Manage));

    let stored = dir.org_vault_wrap(vault, member).unwrap();
    let view = unwrap(&stored, AvailableKeyMaterial::PrivateKey(&member_keys.secret)).unwrap();
    assert_eq!(view, vault_key);
}

#[test]
fn rewrap_membership_is_audited() {
    let dir = MemoryDirectory::new();
    let (owner, owner_master, _keys) = initialized_principal(&dir, "owner secret");
    let (member, _m, member_keys) = initialized_principal(&dir, "member secret");

    let vault_key = generate_vault_key();
    let owner_wrap = wrap_for_owner(&vault_key, &owner_master).unwrap();
    let (org, vault) = dir.create_org(owner, owner_wrap).unwrap();

    let invitation = dir.invite(org, member, Role::Member).unwrap();
    let wrap = wrap_for_member(&vault_key, &member_keys.public).unwrap();
    dir.accept_invitation(invitation, wrap).unwrap();

    // Rotate the vault key and re-wrap for the member.
    let new_vault_key = generate_vault_key();
    let new_wrap = wrap_for_member(&new_vault_key, &member_keys.public).unwrap();
    dir.rewrap_membership(org, member, new_wrap).unwrap();

    let stored = dir.org_vault_wrap(vault, member).unwrap();
    let view = unwrap(&stored, AvailableKeyMaterial::PrivateKey(&member_keys.secret)).unwrap();
    assert_eq!(view, new_vault_key);

    assert!(dir
        .audit_log()
        .iter()
        .any(|r| r.action == AuditAction::MembershipRewrapped));
}

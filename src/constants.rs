// MIT License - Copyright (c) 2026 Peter Wright
// ADT Pulse portal constants

/// Default portal host.
pub const API_HOST: &str = "https://portal.adtpulse.com";

/// Path prefix preceding the versioned portal paths.
pub const API_PREFIX: &str = "/myhome/";

/// Portal version assumed when it cannot be detected from the redirect URL.
pub const DEFAULT_API_VERSION: &str = "16.0.0-131";

pub const LOGIN_URI: &str = "/access/signin.jsp";
pub const LOGOUT_URI: &str = "/access/signout.jsp";
pub const SUMMARY_URI: &str = "/summary/summary.jsp";
pub const ZONES_URI: &str = "/ajax/homeViewDevAjax.jsp";
pub const SYNC_CHECK_URI: &str = "/Ajax/SyncCheckServ";
pub const ARM_DISARM_URI: &str = "/quickcontrol/armDisarm.jsp";

/// Sync token held before the first sync check.
pub const INITIAL_SYNC_TOKEN: &str = "0-0-0";

/// Login form field names.
pub const FORM_USERNAME: &str = "usernameForm";
pub const FORM_PASSWORD: &str = "passwordForm";
pub const FORM_SUN: &str = "sun";

/// Target handed to the arm/disarm quick control.
pub const ARM_STATE_HREF: &str = "rest/adt/ui/client/security/setArmState";

/// CSS selectors for the elements scraped out of portal pages.
pub const LOGIN_ERROR_SELECTOR: &str = "div#warnMsgContents";
pub const ALARM_ORB_SELECTOR: &str = "canvas#ic_orb";
pub const ALARM_ORB_ATTR: &str = "orb";
pub const SINGLE_PREMISE_SELECTOR: &str = "span#p_singlePremise";
pub const SIGNOUT_LINK_SELECTOR: &str = "a.p_signoutlink";

/// Text the portal serves in place of the requested page once the session has lapsed.
pub const SIGNED_OUT_MARKER: &str =
    "You have not yet signed in or you have been signed out due to inactivity.";

/// Zone fields that carry nothing useful to callers and are dropped when flattening.
pub const DROPPED_ZONE_FIELDS: [&str; 2] = ["deprecatedAction", "devIndex"];

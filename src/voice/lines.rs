//! Candidate speech lines. One is picked at random per response; `{crop}`
//! is replaced with the crop's display name.

pub const WELCOME: &str = "Welcome to Sproutvale! In your cozy farm you can plant seeds, \
water your crops, and harvest them when they're ready. To get started, try saying \
\"plant tomatoes\" or \"plant carrots\". You can also say \"check my farm\" to see \
what's growing. What would you like to do first?";

pub const WELCOME_REPROMPT: &str =
    "You can say things like \"plant tomatoes\", \"water my crops\", or \"check my farm\". \
What would you like to do?";

pub const HELP_REPROMPT: &str = "Try saying \"plant tomatoes\" to get started, or \
\"check my farm\" to see what's already growing. What would you like to do?";

pub const NEXT_REPROMPT: &str = "What would you like to do next? You can plant crops, \
water them, check your farm, or harvest what's ready.";

pub const ERROR_REPROMPT: &str = "You can try planting crops, watering them, harvesting \
what's ready, or checking your farm status.";

pub const PLANTED: &[&str] = &[
    "Perfect! I've planted {crop} in your farm. The little seeds are nestled in the rich, \
dark soil. They'll need some water to grow big and strong!",
    "Wonderful choice! Your {crop} seeds are now planted. I can already imagine how \
beautiful they'll look when they sprout. Don't forget to water them!",
    "Excellent! {crop} planted successfully! The soil looks perfect for growing. Try \
watering them next.",
    "Great job! I've carefully planted your {crop} seeds. They're tucked in nice and cozy \
in the soil. Water them when you're ready!",
];

pub const WATERED: &[&str] = &[
    "Ahh, perfect! Your crops are getting a lovely drink of fresh water. I can almost see \
them perking up already.",
    "Beautiful! The water is soaking into the soil just right. Your plants are going to be \
so happy and healthy.",
    "Wonderful watering! The droplets are glistening on the leaves like little diamonds.",
    "Perfect timing! Your plants were getting a bit thirsty, and now they're getting \
exactly what they need.",
];

pub const HARVESTED: &[&str] = &[
    "Fantastic! What a beautiful harvest! Your hard work really paid off!",
    "Wonderful! Your crops are perfect! These look absolutely delicious!",
    "Amazing harvest! Your crops are ripe, fresh, and ready! You're becoming such a \
skilled farmer!",
    "Perfect timing! These crops are at their peak! Your patience and care paid off!",
];

pub const ENCOURAGEMENTS: &[&str] = &[
    " Why don't you plant some new crops to keep your farm growing?",
    " Your farm has room for more crops! What would you like to plant next?",
    " You could plant some new seeds or check what else is growing!",
    " How about planting something new? You have so many options!",
];

pub const GOODBYES: &[&str] = &[
    "Thanks for visiting your farm! Your crops will keep growing while you're away. Come \
back soon to check on them!",
    "Goodbye, farmer! Your plants will be waiting for you. Don't forget to water them when \
you return!",
    "See you later! Your farm is in good hands. Come back anytime to tend to your crops!",
    "Happy farming! Your crops are growing beautifully. Visit again soon to harvest them!",
];

pub const ERRORS: &[&str] = &[
    "Oh no! Something went wrong on your farm. Let me try to help you again. What would you \
like to do?",
    "Oops! I had a little trouble there. Your farm is still safe! What would you like to do \
next?",
    "Sorry about that! There was a small hiccup, but your crops are still growing! How can \
I help you?",
];
